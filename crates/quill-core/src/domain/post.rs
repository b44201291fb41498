use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Post entity - a blog post owned by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub cover: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new post from a validated draft.
    pub fn new(author_id: Uuid, draft: PostDraft, cover: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: draft.title,
            summary: draft.summary,
            content: draft.content,
            cover,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge changes into the post. Absent fields keep their current value.
    pub fn apply(&mut self, changes: PostChanges, cover: Option<String>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(summary) = changes.summary {
            self.summary = summary;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
        if cover.is_some() {
            self.cover = cover;
        }
        self.updated_at = Utc::now();
    }
}

/// Author fields exposed alongside a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
}

/// A post with its author reference expanded for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithAuthor {
    pub post: Post,
    pub author: Option<AuthorSummary>,
}

/// Fields supplied when creating a post.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub title: String,
    pub summary: String,
    pub content: String,
}

impl PostDraft {
    /// All of title, summary and content must be present and non-blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        if [&self.title, &self.summary, &self.content]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(DomainError::Validation(
                "All fields are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fields supplied when updating a post.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
}

impl PostChanges {
    /// Supplied fields may not be blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("title", &self.title),
            ("summary", &self.summary),
            ("content", &self.content),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(DomainError::Validation(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}
