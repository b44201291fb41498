//! # Quill Core
//!
//! The domain layer of the Quill blog backend.
//! Business rules for accounts and posts live here, with persistence, hashing,
//! signing and file storage reached only through the traits in [`ports`].

pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::DomainError;
