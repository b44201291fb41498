//! Authentication ports.

use uuid::Uuid;

/// Identity decoded from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub user_id: Uuid,
    pub username: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

/// Issues and verifies signed identity assertions.
pub trait TokenService: Send + Sync {
    /// Sign a fresh token for a user.
    fn issue_token(&self, user_id: Uuid, username: &str) -> Result<String, AuthError>;

    /// Verify a token and decode the identity it carries.
    fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError>;

    /// Token lifetime, used for the cookie max-age.
    fn lifetime_seconds(&self) -> i64;
}

/// Password hashing service.
pub trait PasswordService: Send + Sync {
    /// Hash a plain text password.
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    /// Verify a password against a hash.
    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Missing authentication token")]
    MissingAuth,

    #[error("Hashing error: {0}")]
    HashingError(String),

    #[error("Signing error: {0}")]
    SigningError(String),

    #[error("Authentication unavailable: {0}")]
    Configuration(String),
}
