use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{ChatError, ChatResult, users::UserStore};

pub const TEXT_MAX: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub from: Uuid,
    pub to: Uuid,
    pub text: String,
    /// Milliseconds since the Unix epoch, assigned by the server.
    pub sent_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageParams {
    pub from: Uuid,
    pub to: Uuid,
    pub text: String,
}

#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persists a message between two existing users.
    async fn save(&self, params: MessageParams) -> ChatResult<Message>;

    /// Every message exchanged between the two users, oldest first.
    async fn find(&self, requester_id: Uuid, target_id: Uuid) -> ChatResult<Vec<Message>>;
}

pub struct SqliteMessages {
    db_pool: SqlitePool,
    users: Arc<dyn UserStore>,
}

impl SqliteMessages {
    pub fn new(db_pool: SqlitePool, users: Arc<dyn UserStore>) -> Self {
        Self { db_pool, users }
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[async_trait]
impl MessageStore for SqliteMessages {
    async fn save(&self, MessageParams { from, to, text }: MessageParams) -> ChatResult<Message> {
        if !self.users.exists(from).await? || !self.users.exists(to).await? {
            return Err(ChatError::validation("There is not such user in the system!"));
        }
        if text.is_empty() {
            return Err(ChatError::validation("Invalid message text!"));
        }
        if text.chars().count() > TEXT_MAX {
            return Err(ChatError::validation("Message text is too long!"));
        }

        let message = Message {
            id: Uuid::now_v7(),
            from,
            to,
            text,
            sent_at: now_millis(),
        };
        sqlx::query("INSERT INTO messages (id,sender,receiver,text,sent_at) VALUES (?,?,?,?,?)")
            .bind(message.id.to_string())
            .bind(message.from.to_string())
            .bind(message.to.to_string())
            .bind(&message.text)
            .bind(message.sent_at)
            .execute(&self.db_pool)
            .await?;

        Ok(message)
    }

    async fn find(&self, requester_id: Uuid, target_id: Uuid) -> ChatResult<Vec<Message>> {
        if !self.users.exists(requester_id).await? || !self.users.exists(target_id).await? {
            return Err(ChatError::validation("Invalid target user id!"));
        }

        let rows: Vec<(String, String, String, String, i64)> = sqlx::query_as(
            "SELECT id,sender,receiver,text,sent_at FROM messages \
             WHERE (sender=?1 AND receiver=?2) OR (sender=?2 AND receiver=?1) \
             ORDER BY sent_at, id",
        )
            .bind(requester_id.to_string())
            .bind(target_id.to_string())
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter()
            .map(|(id, from, to, text, sent_at)| -> ChatResult<Message> {
                Ok(Message {
                    id: Uuid::parse_str(&id)?,
                    from: Uuid::parse_str(&from)?,
                    to: Uuid::parse_str(&to)?,
                    text,
                    sent_at,
                })
            })
            .collect()
    }
}
