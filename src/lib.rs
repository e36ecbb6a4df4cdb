pub mod config;
pub mod db;
pub mod messages;
pub mod rooms;
pub mod token;
pub mod users;

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, rooms::Room};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub room: Arc<Room>,
    pub config: Arc<Config>,
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Failure of a chat operation, classified by how the handler boundary answers it.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Reason text goes back to the originating session verbatim.
    #[error("{0}")]
    Validation(String),
    /// Always answered with the same generic text, nothing about the cause leaks.
    #[error("not authorised")]
    Unauthorized,
    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ChatError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

impl From<token::TokenError> for ChatError {
    fn from(_: token::TokenError) -> Self {
        Self::Unauthorized
    }
}

impl From<uuid::Error> for ChatError {
    fn from(err: uuid::Error) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}
