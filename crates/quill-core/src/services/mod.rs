//! Domain services composed from the ports.

mod credentials;
mod ownership;
mod posts;

pub use credentials::CredentialStore;
pub use ownership::{Access, authorize};
pub use posts::{PostService, RECENT_POSTS_LIMIT};
