//! Credential store - account creation and password checks.

use std::sync::Arc;

use crate::domain::User;
use crate::error::{DomainError, RepoError};
use crate::ports::{PasswordService, UserRepository};

/// Registers users and checks their passwords.
///
/// Plaintext passwords only ever reach the [`PasswordService`]; they are never
/// stored or logged.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    passwords: Arc<dyn PasswordService>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepository>, passwords: Arc<dyn PasswordService>) -> Self {
        Self { users, passwords }
    }

    /// Create an account. A taken username is reported by the repository's
    /// uniqueness constraint as [`DomainError::Duplicate`].
    pub async fn create(&self, username: &str, password: &str) -> Result<User, DomainError> {
        let username = User::normalize_username(username)?;
        if password.is_empty() {
            return Err(DomainError::Validation("Password is required".to_string()));
        }

        let password_hash = self.passwords.hash(password)?;
        let user = User::new(username, password_hash);

        match self.users.insert(user).await {
            Ok(saved) => {
                tracing::info!(user_id = %saved.id, username = %saved.username, "User registered");
                Ok(saved)
            }
            Err(RepoError::Duplicate(_)) => Err(DomainError::Duplicate(
                "Username already taken".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<User, DomainError> {
        self.users
            .find_by_username(username.trim())
            .await?
            .ok_or_else(|| DomainError::not_found("User", username.trim()))
    }

    pub fn verify_password(&self, user: &User, password: &str) -> Result<bool, DomainError> {
        Ok(self.passwords.verify(password, &user.password_hash)?)
    }

    /// Look up a user and check the password in one step.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, DomainError> {
        let user = self.find_by_username(username).await?;
        if !self.verify_password(&user, password)? {
            tracing::debug!(username = %user.username, "Password mismatch");
            return Err(DomainError::InvalidCredentials);
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::*;
    use crate::ports::{AuthError, BaseRepository};

    /// Reversible "hash" keeps these tests independent of a real KDF.
    struct PlainPasswords;

    impl PasswordService for PlainPasswords {
        fn hash(&self, password: &str) -> Result<String, AuthError> {
            Ok(format!("hashed:{password}"))
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
            Ok(hash.strip_prefix("hashed:") == Some(password))
        }
    }

    #[derive(Default)]
    struct Users(Mutex<HashMap<Uuid, User>>);

    #[async_trait]
    impl BaseRepository<User, Uuid> for Users {
        async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
            Ok(self.0.lock().await.get(&id).cloned())
        }

        async fn insert(&self, user: User) -> Result<User, RepoError> {
            let mut users = self.0.lock().await;
            if users.values().any(|u| u.username == user.username) {
                return Err(RepoError::Duplicate(user.username));
            }
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn update(&self, user: User) -> Result<User, RepoError> {
            self.0.lock().await.insert(user.id, user.clone());
            Ok(user)
        }
    }

    #[async_trait]
    impl UserRepository for Users {
        async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
            Ok(self
                .0
                .lock()
                .await
                .values()
                .find(|u| u.username == username)
                .cloned())
        }
    }

    fn store() -> (CredentialStore, Arc<Users>) {
        let users = Arc::new(Users::default());
        (
            CredentialStore::new(users.clone(), Arc::new(PlainPasswords)),
            users,
        )
    }

    #[tokio::test]
    async fn test_create_hashes_password() {
        let (store, _) = store();
        let user = store.create("alice", "pw1").await.unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "pw1");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let (store, users) = store();
        store.create("alice", "pw1").await.unwrap();

        let second = store.create("alice", "other").await;
        assert!(matches!(second, Err(DomainError::Duplicate(_))));
        assert_eq!(users.0.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_password() {
        let (store, _) = store();
        assert!(matches!(
            store.create("alice", "").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let (store, _) = store();
        let created = store.create("alice", "pw1").await.unwrap();

        let user = store.authenticate("alice", "pw1").await.unwrap();
        assert_eq!(user.id, created.id);

        assert!(matches!(
            store.authenticate("alice", "nope").await,
            Err(DomainError::InvalidCredentials)
        ));
        assert!(matches!(
            store.authenticate("carol", "pw1").await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
