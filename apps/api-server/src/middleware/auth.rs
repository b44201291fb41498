//! Session cookie authentication.
//!
//! The signed token travels in an HttpOnly cookie named [`SESSION_COOKIE`].
//! Handlers that take an [`Identity`] are closed to anonymous callers:
//!
//! ```ignore
//! async fn protected_route(identity: Identity) -> impl Responder {
//!     format!("Hello, {}!", identity.username)
//! }
//! ```

use std::future::{Ready, ready};

use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, dev::Payload, web};
use uuid::Uuid;

use quill_core::ports::{AuthError, TokenClaims};
use quill_shared::ErrorResponse;

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "token";

/// Authenticated caller, decoded from the session cookie.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        }
    }
}

/// Error type for authentication failures.
#[derive(Debug)]
pub struct AuthenticationError(pub AuthError);

impl std::fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ResponseError for AuthenticationError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AuthError::MissingAuth => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired | AuthError::InvalidToken(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match &self.0 {
            AuthError::MissingAuth => ErrorResponse::unauthorized("Not logged in"),
            AuthError::TokenExpired => {
                ErrorResponse::forbidden("Session expired. Please login again.")
            }
            AuthError::InvalidToken(_) => ErrorResponse::forbidden("Invalid session token"),
            other => {
                tracing::error!("Authentication unavailable: {}", other);
                ErrorResponse::internal_error()
            }
        };

        HttpResponse::build(self.status_code()).json(error)
    }
}

impl FromRequest for Identity {
    type Error = AuthenticationError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<Identity, AuthenticationError> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| {
        tracing::error!("AppState not found in app data");
        AuthenticationError(AuthError::Configuration("token service missing".to_string()))
    })?;

    let token = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(AuthenticationError(AuthError::MissingAuth))?;

    match state.tokens.verify_token(&token) {
        Ok(claims) => Ok(Identity::from(claims)),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected session token");
            Err(AuthenticationError(e))
        }
    }
}

/// HttpOnly session cookie carrying a freshly issued token.
pub fn session_cookie(token: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

/// Expired, empty session cookie; clears the browser's copy.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, "")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .finish()
}
