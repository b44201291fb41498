//! Account and session handlers.

use actix_web::{HttpResponse, web};

use quill_shared::dto::{LoginRequest, ProfileResponse, RegisterUserRequest, SessionResponse, UserResponse};

use crate::middleware::auth::{Identity, clear_session_cookie, session_cookie};
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /register
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterUserRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let user = state.credentials.create(&req.username, &req.password).await?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: user.id,
        username: user.username,
        created_at: user.created_at,
    }))
}

/// POST /login - sets the session cookie on success.
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let user = state.credentials.authenticate(&req.username, &req.password).await?;

    let token = state
        .tokens
        .issue_token(user.id, &user.username)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let cookie = session_cookie(token, state.tokens.lifetime_seconds(), state.cookie_secure);

    tracing::info!(user_id = %user.id, username = %user.username, "User logged in");

    Ok(HttpResponse::Ok().cookie(cookie).json(SessionResponse {
        id: user.id,
        username: user.username,
    }))
}

/// POST /logout
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(clear_session_cookie(state.cookie_secure))
        .json("ok")
}

/// GET /profile - echoes the identity carried by the session token.
pub async fn profile(identity: Identity) -> AppResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(ProfileResponse {
        id: identity.user_id,
        username: identity.username,
        iat: identity.issued_at,
        exp: identity.expires_at,
    }))
}
