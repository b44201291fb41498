//! Post handlers.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};

use quill_core::domain::{AuthorSummary, Post, PostWithAuthor};
use quill_core::services::RECENT_POSTS_LIMIT;
use quill_shared::dto::{AuthorResponse, PostResponse};

use crate::middleware::auth::Identity;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;
use crate::upload::read_post_form;

fn to_response(post: Post, author: Option<AuthorSummary>) -> PostResponse {
    PostResponse {
        id: post.id,
        title: post.title,
        summary: post.summary,
        content: post.content,
        cover: post.cover,
        author: author.map(|a| AuthorResponse {
            id: a.id,
            username: a.username,
        }),
        created_at: post.created_at,
        updated_at: post.updated_at,
    }
}

fn caller_summary(identity: &Identity) -> AuthorSummary {
    AuthorSummary {
        id: identity.user_id,
        username: identity.username.clone(),
    }
}

fn with_author(value: PostWithAuthor) -> PostResponse {
    to_response(value.post, value.author)
}

/// POST /post - multipart form with a required cover file.
///
/// The identity is extracted before the body is read, so anonymous uploads
/// are refused without being buffered.
pub async fn create_post(
    state: web::Data<AppState>,
    identity: Identity,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let (draft, cover) = read_post_form(payload).await?.into_draft();
    let cover = cover.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    let post = state.posts.create(draft, Some(cover), identity.user_id).await?;

    Ok(HttpResponse::Ok().json(to_response(post, Some(caller_summary(&identity)))))
}

/// PUT /post - the form's `id` names the post; only its author may edit it.
pub async fn update_post(
    state: web::Data<AppState>,
    identity: Identity,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let (id, changes, cover) = read_post_form(payload).await?.into_changes();
    let id = id.unwrap_or_default();

    let post = state.posts.update(&id, changes, cover, identity.user_id).await?;

    Ok(HttpResponse::Ok().json(to_response(post, Some(caller_summary(&identity)))))
}

/// GET /post - most recent posts, newest first.
pub async fn list_posts(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let posts: Vec<PostResponse> = state
        .posts
        .list_recent(RECENT_POSTS_LIMIT)
        .await?
        .into_iter()
        .map(with_author)
        .collect();

    Ok(HttpResponse::Ok().json(posts))
}

/// GET /post/{id}
pub async fn get_post(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let post = state.posts.get_by_id(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(with_author(post)))
}
