//! Cover file storage.

mod local;

pub use local::{LocalCoverStore, UPLOADS_PREFIX};
