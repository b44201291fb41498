//! Domain entities - the core business objects.

mod cover;
mod post;
mod user;

pub use cover::{ALLOWED_COVER_TYPES, CoverUpload, MAX_COVER_BYTES};
pub use post::{AuthorSummary, Post, PostChanges, PostDraft, PostWithAuthor};
pub use user::{MAX_USERNAME_LEN, User};
