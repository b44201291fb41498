//! Post service - creation, authorised update and public reads.

use std::sync::Arc;

use uuid::Uuid;

use super::ownership::{Access, authorize};
use crate::domain::{CoverUpload, Post, PostChanges, PostDraft, PostWithAuthor};
use crate::error::DomainError;
use crate::ports::{CoverStore, PostRepository};

/// Number of posts returned by the public listing.
pub const RECENT_POSTS_LIMIT: u64 = 20;

/// Post operations over a [`PostRepository`] and a [`CoverStore`].
#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    covers: Arc<dyn CoverStore>,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>, covers: Arc<dyn CoverStore>) -> Self {
        Self { posts, covers }
    }

    /// Parse a client-supplied post id.
    pub fn parse_id(raw: &str) -> Result<Uuid, DomainError> {
        Uuid::parse_str(raw.trim()).map_err(|_| DomainError::InvalidId("Invalid post ID".to_string()))
    }

    pub async fn create(
        &self,
        draft: PostDraft,
        cover: Option<CoverUpload>,
        author_id: Uuid,
    ) -> Result<Post, DomainError> {
        draft.validate()?;
        if let Some(cover) = &cover {
            cover.validate()?;
        }

        let cover_path = match &cover {
            Some(cover) => Some(self.covers.store(cover).await?),
            None => None,
        };

        let post = Post::new(author_id, draft, cover_path.clone());
        match self.posts.insert(post).await {
            Ok(saved) => {
                tracing::info!(post_id = %saved.id, author_id = %author_id, "Post created");
                Ok(saved)
            }
            Err(e) => {
                if let Some(path) = cover_path {
                    self.discard_cover(&path).await;
                }
                Err(e.into())
            }
        }
    }

    /// Update a post on behalf of `caller_id`, who must be its author.
    pub async fn update(
        &self,
        raw_id: &str,
        changes: PostChanges,
        cover: Option<CoverUpload>,
        caller_id: Uuid,
    ) -> Result<Post, DomainError> {
        let id = Self::parse_id(raw_id)?;
        let mut post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", id))?;

        if authorize(&post, caller_id) == Access::Denied {
            tracing::warn!(post_id = %id, caller_id = %caller_id, "Update rejected: not the author");
            return Err(DomainError::Forbidden("You are not the author".to_string()));
        }

        changes.validate()?;
        if let Some(cover) = &cover {
            cover.validate()?;
        }

        let new_cover = match &cover {
            Some(cover) => Some(self.covers.store(cover).await?),
            None => None,
        };
        let superseded = new_cover.as_ref().and(post.cover.clone());

        post.apply(changes, new_cover.clone());
        match self.posts.update(post).await {
            Ok(saved) => {
                if let Some(old) = superseded {
                    self.discard_cover(&old).await;
                }
                tracing::info!(post_id = %saved.id, "Post updated");
                Ok(saved)
            }
            Err(e) => {
                if let Some(path) = new_cover {
                    self.discard_cover(&path).await;
                }
                Err(e.into())
            }
        }
    }

    /// Fetch one post. Malformed ids are rejected before the store is queried.
    pub async fn get_by_id(&self, raw_id: &str) -> Result<PostWithAuthor, DomainError> {
        let id = Self::parse_id(raw_id)?;
        self.posts
            .find_with_author(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Post", id))
    }

    pub async fn list_recent(&self, limit: u64) -> Result<Vec<PostWithAuthor>, DomainError> {
        Ok(self.posts.list_recent(limit).await?)
    }

    async fn discard_cover(&self, path: &str) {
        if let Err(e) = self.covers.remove(path).await {
            tracing::warn!(cover = %path, error = %e, "Failed to remove cover file");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::AuthorSummary;
    use crate::error::RepoError;
    use crate::ports::{BaseRepository, StorageError};

    #[derive(Default)]
    struct Posts {
        rows: Mutex<HashMap<Uuid, Post>>,
        calls: Mutex<usize>,
    }

    impl Posts {
        async fn touch(&self) {
            *self.calls.lock().await += 1;
        }
    }

    #[async_trait]
    impl BaseRepository<Post, Uuid> for Posts {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, RepoError> {
            self.touch().await;
            Ok(self.rows.lock().await.get(&id).cloned())
        }

        async fn insert(&self, post: Post) -> Result<Post, RepoError> {
            self.touch().await;
            self.rows.lock().await.insert(post.id, post.clone());
            Ok(post)
        }

        async fn update(&self, post: Post) -> Result<Post, RepoError> {
            self.touch().await;
            self.rows.lock().await.insert(post.id, post.clone());
            Ok(post)
        }
    }

    #[async_trait]
    impl PostRepository for Posts {
        async fn find_with_author(&self, id: Uuid) -> Result<Option<PostWithAuthor>, RepoError> {
            self.touch().await;
            Ok(self.rows.lock().await.get(&id).cloned().map(|post| PostWithAuthor {
                author: Some(AuthorSummary {
                    id: post.author_id,
                    username: "someone".to_string(),
                }),
                post,
            }))
        }

        async fn list_recent(&self, limit: u64) -> Result<Vec<PostWithAuthor>, RepoError> {
            self.touch().await;
            let mut posts: Vec<Post> = self.rows.lock().await.values().cloned().collect();
            posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(posts
                .into_iter()
                .take(limit as usize)
                .map(|post| PostWithAuthor { post, author: None })
                .collect())
        }
    }

    #[derive(Default)]
    struct Covers {
        stored: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CoverStore for Covers {
        async fn store(&self, cover: &CoverUpload) -> Result<String, StorageError> {
            let mut stored = self.stored.lock().await;
            let path = format!("uploads/{}.{}", stored.len(), cover.extension());
            stored.push(path.clone());
            Ok(path)
        }

        async fn remove(&self, path: &str) -> Result<(), StorageError> {
            self.stored.lock().await.retain(|p| p != path);
            Ok(())
        }
    }

    fn service() -> (PostService, Arc<Posts>, Arc<Covers>) {
        let posts = Arc::new(Posts::default());
        let covers = Arc::new(Covers::default());
        (PostService::new(posts.clone(), covers.clone()), posts, covers)
    }

    fn draft() -> PostDraft {
        PostDraft {
            title: "T".to_string(),
            summary: "S".to_string(),
            content: "C".to_string(),
        }
    }

    fn jpeg() -> CoverUpload {
        CoverUpload::new("cover.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    #[tokio::test]
    async fn test_create_stores_cover() {
        let (service, _, covers) = service();
        let author = Uuid::new_v4();

        let post = service.create(draft(), Some(jpeg()), author).await.unwrap();

        assert_eq!(post.author_id, author);
        assert_eq!(post.cover.as_deref(), Some("uploads/0.jpg"));
        assert_eq!(covers.stored.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_pdf_before_anything_is_written() {
        let (service, posts, covers) = service();
        let pdf = CoverUpload::new("paper.pdf", "application/pdf", vec![1, 2, 3]);

        let result = service.create(draft(), Some(pdf), Uuid::new_v4()).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(posts.rows.lock().await.is_empty());
        assert!(covers.stored.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let (service, posts, _) = service();
        let mut incomplete = draft();
        incomplete.content.clear();

        let result = service.create(incomplete, Some(jpeg()), Uuid::new_v4()).await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(posts.rows.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_by_other_user_is_denied_whatever_the_fields() {
        let (service, posts, covers) = service();
        let post = service.create(draft(), Some(jpeg()), Uuid::new_v4()).await.unwrap();
        let intruder = Uuid::new_v4();

        let attempts = [
            PostChanges::default(),
            PostChanges {
                title: Some("Hacked".to_string()),
                summary: Some("x".to_string()),
                content: Some("y".to_string()),
            },
            PostChanges {
                title: Some(String::new()),
                ..Default::default()
            },
        ];

        for changes in attempts {
            let result = service
                .update(&post.id.to_string(), changes, Some(jpeg()), intruder)
                .await;
            assert!(matches!(result, Err(DomainError::Forbidden(_))));
        }

        assert_eq!(posts.rows.lock().await.get(&post.id), Some(&post));
        assert_eq!(covers.stored.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_by_author_merges_fields() {
        let (service, _, covers) = service();
        let author = Uuid::new_v4();
        let post = service.create(draft(), Some(jpeg()), author).await.unwrap();

        let updated = service
            .update(
                &post.id.to_string(),
                PostChanges {
                    title: Some("New title".to_string()),
                    ..Default::default()
                },
                None,
                author,
            )
            .await
            .unwrap();

        assert_eq!(updated.title, "New title");
        assert_eq!(updated.summary, "S");
        assert_eq!(updated.cover, post.cover);
        assert_eq!(covers.stored.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_cover_and_discards_old_file() {
        let (service, _, covers) = service();
        let author = Uuid::new_v4();
        let post = service.create(draft(), Some(jpeg()), author).await.unwrap();

        let png = CoverUpload::new("new.png", "image/png", vec![0x89, 0x50]);
        let updated = service
            .update(&post.id.to_string(), PostChanges::default(), Some(png), author)
            .await
            .unwrap();

        assert_eq!(updated.cover.as_deref(), Some("uploads/1.png"));
        assert_eq!(*covers.stored.lock().await, vec!["uploads/1.png".to_string()]);
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let (service, _, _) = service();
        let result = service
            .update(
                &Uuid::new_v4().to_string(),
                PostChanges::default(),
                None,
                Uuid::new_v4(),
            )
            .await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_get_by_id_with_malformed_id_never_reaches_store() {
        let (service, posts, _) = service();

        for raw in ["", "123", "not-a-uuid", "6543a1f2e4b0c9d8e7f6a5b4"] {
            let result = service.get_by_id(raw).await;
            assert!(matches!(result, Err(DomainError::InvalidId(_))), "{raw}");
        }

        assert_eq!(*posts.calls.lock().await, 0);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let (service, _, _) = service();
        let result = service.get_by_id(&Uuid::new_v4().to_string()).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_recent_is_bounded_and_ordered() {
        let (service, posts, _) = service();
        let author = Uuid::new_v4();
        let base = Utc::now();
        {
            let mut rows = posts.rows.lock().await;
            for i in 0..25 {
                let mut post = Post::new(author, draft(), None);
                post.created_at = base - Duration::minutes(i * 7 % 25);
                rows.insert(post.id, post);
            }
        }

        let recent = service.list_recent(RECENT_POSTS_LIMIT).await.unwrap();

        assert_eq!(recent.len(), RECENT_POSTS_LIMIT as usize);
        assert!(
            recent
                .windows(2)
                .all(|pair| pair[0].post.created_at >= pair[1].post.created_at)
        );
    }
}
