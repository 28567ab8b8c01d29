// User repository implementation

use crate::db::store::UserStore;
use crate::db::DbPool;
use crate::errors::PersistenceError;
use crate::models::User;
use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

/// Repository for reminder owners
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    #[instrument(skip(self))]
    async fn find_by_chat_id(&self, chat_id: &str) -> Result<Option<User>, PersistenceError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, chat_id, name, created_at
            FROM users
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(user)
    }

    /// Concurrent first contacts for the same address resolve to one row
    #[instrument(skip(self))]
    async fn find_or_create_by_chat_id(
        &self,
        chat_id: &str,
        name: Option<&str>,
    ) -> Result<User, PersistenceError> {
        if let Some(user) = self.find_by_chat_id(chat_id).await? {
            return Ok(user);
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, chat_id, name, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (chat_id) DO UPDATE SET chat_id = EXCLUDED.chat_id
            RETURNING id, chat_id, name, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(name)
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(user_id = %user.id, chat_id = %user.chat_id, "User registered");
        Ok(user)
    }
}
