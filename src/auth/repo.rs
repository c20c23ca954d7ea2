use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::{auth::repo_types::User, error::AppError};

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateUser,
            StoreError::Database(e) => {
                AppError::Internal(anyhow::Error::new(e).context("user store"))
            }
        }
    }
}

/// Persistence seam for user records. Emails are matched exactly as stored.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;

    async fn close(&self);
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, is_active, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let unique = matches!(
                &e,
                sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION)
            );
            if unique {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub mod memory {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use time::OffsetDateTime;

    use super::{StoreError, UserStore};
    use crate::auth::repo_types::User;

    /// In-process store backing the HTTP tests.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<Vec<User>>,
        delay: Option<Duration>,
    }

    impl MemoryUserStore {
        /// Store whose email lookups stall for `delay` before answering.
        pub fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::default()
            }
        }

        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        pub fn set_active(&self, id: i64, active: bool) {
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.iter_mut().find(|u| u.id == id) {
                user.is_active = active;
            }
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.email == email).cloned())
        }

        async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.id == id).cloned())
        }

        async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == email) {
                return Err(StoreError::DuplicateEmail);
            }
            let user = User {
                id: users.len() as i64 + 1,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                is_active: true,
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(user.clone());
            Ok(user)
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn lookups_are_exact_match() {
        let store = MemoryUserStore::default();
        store.create("A@x.com", "hash").await.unwrap();
        assert!(store.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(store.find_by_email(" A@x.com").await.unwrap().is_none());
        assert_eq!(store.find_by_email("A@x.com").await.unwrap().unwrap().id, 1);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::default();
        store.create("a@x.com", "hash").await.unwrap();
        assert!(matches!(
            store.create("a@x.com", "other").await,
            Err(StoreError::DuplicateEmail)
        ));
        assert_eq!(store.len(), 1);
    }
}
