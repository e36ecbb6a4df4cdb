use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::{ChatError, ChatResult};

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
}

/// Checks an already trimmed username.
pub fn validate_username(username: &str) -> ChatResult<()> {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err(ChatError::validation("Username is too short"));
    }
    if len > USERNAME_MAX {
        return Err(ChatError::validation("Username is too long"));
    }
    Ok(())
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn find_by_id(&self, id: Uuid) -> ChatResult<Option<User>>;

    /// Returns the user owning `username`, creating it on first use.
    async fn find_or_create_by_username(&self, username: &str) -> ChatResult<User>;

    async fn exists(&self, id: Uuid) -> ChatResult<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}

pub struct SqliteUsers {
    db_pool: SqlitePool,
}

impl SqliteUsers {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserStore for SqliteUsers {
    async fn find_by_id(&self, id: Uuid) -> ChatResult<Option<User>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT username FROM users WHERE id=?")
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(row.map(|(username,)| User { id, username }))
    }

    async fn find_or_create_by_username(&self, username: &str) -> ChatResult<User> {
        let username = username.trim();
        validate_username(username)?;

        let id = Uuid::now_v7();
        let inserted = sqlx::query("INSERT INTO users (id,username) VALUES (?,?) ON CONFLICT(username) DO NOTHING")
            .bind(id.to_string())
            .bind(username)
            .execute(&self.db_pool)
            .await?
            .rows_affected();
        if inserted == 1 {
            debug!("adding user {username}#{id}");
            return Ok(User { id, username: username.to_owned() });
        }

        let (id,): (String,) = sqlx::query_as("SELECT id FROM users WHERE username=?")
            .bind(username)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(User { id: Uuid::parse_str(&id)?, username: username.to_owned() })
    }
}
