//! Author-ownership check gating post mutation.

use uuid::Uuid;

use crate::domain::Post;

/// Outcome of an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

/// Only the author of a post may change it.
pub fn authorize(post: &Post, caller_id: Uuid) -> Access {
    if post.author_id == caller_id {
        Access::Allowed
    } else {
        Access::Denied
    }
}
