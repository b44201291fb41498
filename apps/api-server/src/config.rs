//! Application configuration loaded from environment variables.
//!
//! Built once at startup and passed down by reference; nothing reads the
//! environment after this point.

use std::path::PathBuf;
use std::time::Duration;

use quill_infra::{DatabaseConfig, JwtConfig};

const MIN_SECRET_LEN: usize = 32;

/// Configuration errors - the server refuses to start on any of these.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Token and cookie settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub cookie_secure: bool,
}

/// Per-client request limits.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub max_requests: u32,
    pub window: Duration,
    /// Key clients by forwarded headers instead of the socket peer. Only
    /// safe behind a proxy that overwrites them.
    pub trust_proxy: bool,
}

/// Log output settings.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Enable JSON logging (for production).
    pub json_logs: bool,
}

impl TelemetryConfig {
    /// Read only the logging variables, so tracing can start before the rest
    /// of the configuration is validated.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            json_logs: get("LOG_FORMAT")
                .map(|v| v.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub run_migrations: bool,
    pub auth: AuthConfig,
    /// Single origin allowed to make credentialed cross-origin requests.
    pub frontend_url: Option<String>,
    pub upload_dir: PathBuf,
    pub rate_limit: RateLimitSettings,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if secret.len() < MIN_SECRET_LEN {
            tracing::warn!(
                "JWT_SECRET is shorter than {} bytes; use a longer random secret",
                MIN_SECRET_LEN
            );
        }

        let database = match var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 20)?,
                min_connections: parse_or(&var, "DB_MIN_CONNECTIONS", 2)?,
            }),
            None => None,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&var, "PORT", 4000)?,
            database,
            run_migrations: parse_bool(&var, "RUN_MIGRATIONS", false)?,
            auth: AuthConfig {
                jwt: JwtConfig {
                    secret,
                    expiration_hours: parse_or(&var, "JWT_EXPIRATION_HOURS", 24)?,
                    issuer: var("JWT_ISSUER").unwrap_or_else(|| "quill-api".to_string()),
                },
                cookie_secure: parse_bool(&var, "COOKIE_SECURE", false)?,
            },
            frontend_url: var("FRONTEND_URL"),
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            rate_limit: RateLimitSettings {
                max_requests: parse_or(&var, "RATE_LIMIT_MAX_REQUESTS", 100)?,
                window: Duration::from_secs(parse_or(&var, "RATE_LIMIT_WINDOW_SECS", 900)?),
                trust_proxy: parse_bool(&var, "TRUST_PROXY", false)?,
            },
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

fn parse_bool<F>(var: &F, name: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no") => Ok(false),
        Some(value) => Err(ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_secret_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::Missing("JWT_SECRET"))));
        assert!(matches!(
            load(&[("JWT_SECRET", "   ")]),
            Err(ConfigError::Missing("JWT_SECRET"))
        ));
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", "0123456789abcdef0123456789abcdef")]).unwrap();

        assert_eq!(config.port, 4000);
        assert!(config.database.is_none());
        assert!(!config.run_migrations);
        assert_eq!(config.auth.jwt.expiration_hours, 24);
        assert_eq!(config.auth.jwt.issuer, "quill-api");
        assert!(!config.auth.cookie_secure);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window, Duration::from_secs(900));
        assert!(!config.rate_limit.trust_proxy);
        assert!(config.frontend_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/quill"),
            ("DB_MAX_CONNECTIONS", "5"),
            ("RUN_MIGRATIONS", "true"),
            ("FRONTEND_URL", "http://localhost:3000"),
            ("COOKIE_SECURE", "1"),
            ("TRUST_PROXY", "yes"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        let db = config.database.unwrap();
        assert_eq!(db.url, "postgres://localhost/quill");
        assert_eq!(db.max_connections, 5);
        assert_eq!(db.min_connections, 2);
        assert!(config.run_migrations);
        assert_eq!(config.frontend_url.as_deref(), Some("http://localhost:3000"));
        assert!(config.auth.cookie_secure);
        assert!(config.rate_limit.trust_proxy);
    }

    #[test]
    fn test_log_format() {
        let json = TelemetryConfig::from_lookup(|key| {
            (key == "LOG_FORMAT").then(|| " JSON ".to_string())
        });
        assert!(json.json_logs);

        let pretty = TelemetryConfig::from_lookup(|_| None);
        assert!(!pretty.json_logs);
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let result = load(&[
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PORT", "eighty"),
        ]);
        assert!(matches!(result, Err(ConfigError::Invalid { name: "PORT", .. })));
    }
}
