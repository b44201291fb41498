//! Application state - shared across all handlers.

use std::sync::Arc;

use anyhow::Context;
use quill_core::ports::{CoverStore, PasswordService, PostRepository, TokenService, UserRepository};
use quill_core::services::{CredentialStore, PostService};
use quill_infra::{
    Argon2PasswordService, InMemoryPostRepository, InMemoryUserRepository, JwtTokenService,
    LocalCoverStore,
};

use crate::config::AppConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub credentials: CredentialStore,
    pub posts: PostService,
    pub tokens: Arc<dyn TokenService>,
    pub cookie_secure: bool,
    /// Which persistence backend is active, reported by the health check.
    pub storage: &'static str,
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let tokens: Arc<dyn TokenService> =
            Arc::new(JwtTokenService::new(config.auth.jwt.clone()));
        let passwords: Arc<dyn PasswordService> = Arc::new(Argon2PasswordService::new());

        let covers = LocalCoverStore::new(config.upload_dir.clone());
        covers
            .ensure_root()
            .await
            .with_context(|| format!("creating upload directory {}", config.upload_dir.display()))?;
        let covers: Arc<dyn CoverStore> = Arc::new(covers);

        let state = match &config.database {
            #[cfg(feature = "postgres")]
            Some(db_config) => {
                Self::postgres(config, db_config, tokens, passwords, covers).await?
            }
            #[cfg(not(feature = "postgres"))]
            Some(_) => {
                tracing::warn!(
                    "DATABASE_URL is set but the postgres feature is disabled. Using in-memory stores."
                );
                Self::in_memory(tokens, passwords, covers, config.auth.cookie_secure)
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL not set. Running in-memory; data is lost on restart."
                );
                Self::in_memory(tokens, passwords, covers, config.auth.cookie_secure)
            }
        };

        tracing::info!(storage = state.storage, "Application state initialized");
        Ok(state)
    }

    #[cfg(feature = "postgres")]
    async fn postgres(
        config: &AppConfig,
        db_config: &quill_infra::DatabaseConfig,
        tokens: Arc<dyn TokenService>,
        passwords: Arc<dyn PasswordService>,
        covers: Arc<dyn CoverStore>,
    ) -> anyhow::Result<Self> {
        use migration::MigratorTrait;
        use quill_infra::{PostgresPostRepository, PostgresUserRepository, database::connect};

        let conn = connect(db_config).await.context("connecting to database")?;

        if config.run_migrations {
            tracing::info!("Running pending migrations");
            migration::Migrator::up(&conn, None)
                .await
                .context("running migrations")?;
        }

        let users: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(conn.clone()));
        let posts: Arc<dyn PostRepository> = Arc::new(PostgresPostRepository::new(conn));

        Ok(Self::assemble(
            users,
            posts,
            passwords,
            tokens,
            covers,
            config.auth.cookie_secure,
            "postgres",
        ))
    }

    /// State backed by process-local stores.
    pub fn in_memory(
        tokens: Arc<dyn TokenService>,
        passwords: Arc<dyn PasswordService>,
        covers: Arc<dyn CoverStore>,
        cookie_secure: bool,
    ) -> Self {
        let users = Arc::new(InMemoryUserRepository::new());
        let posts: Arc<dyn PostRepository> = Arc::new(InMemoryPostRepository::new(users.clone()));

        Self::assemble(users, posts, passwords, tokens, covers, cookie_secure, "memory")
    }

    fn assemble(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        passwords: Arc<dyn PasswordService>,
        tokens: Arc<dyn TokenService>,
        covers: Arc<dyn CoverStore>,
        cookie_secure: bool,
        storage: &'static str,
    ) -> Self {
        Self {
            credentials: CredentialStore::new(users, passwords),
            posts: PostService::new(posts, covers),
            tokens,
            cookie_secure,
            storage,
        }
    }
}
