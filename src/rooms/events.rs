//! Wire contract. Every frame is a JSON array `[code, payload]` where the payload
//! is itself a positional array; `0` in the first slot of a result means success.

use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    messages::{Message, MessageParams},
    users::User,
};

/// Events a client may emit. Anything else is a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    Join,
    SendMessage,
    GetMessages,
    Read,
}

impl EventName {
    pub const ALL: [EventName; 4] = [Self::Join, Self::SendMessage, Self::GetMessages, Self::Read];

    pub fn code(self) -> &'static str {
        match self {
            Self::Join => "j",
            Self::SendMessage => "sm",
            Self::GetMessages => "gm",
            Self::Read => "r",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.code() == code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub username: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub message: MessageParams,
    pub token: Option<String>,
    pub confirmation_hash: String,
}

/// Payload shared by `getMessages` and `read`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogRequest {
    pub target_user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Join(JoinRequest),
    SendMessage(SendMessageRequest),
    GetMessages(DialogRequest),
    Read(DialogRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinResult {
    Joined {
        user: User,
        online: Vec<User>,
        token: String,
    },
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageResult {
    Accepted {
        confirmation_hash: String,
        message_id: Uuid,
        sent_at: i64,
    },
    Rejected {
        reason: String,
        confirmation_hash: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetMessagesResult {
    Found {
        target_user_id: Uuid,
        messages: Vec<Message>,
    },
    Rejected(String),
}

/// Events the server emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    JoinResult(JoinResult),
    NewJoin(User),
    Disconnect(User),
    SendMessageResult(SendMessageResult),
    ReceiveMessage(Message),
    GetMessagesResult(GetMessagesResult),
    /// Carries the id of the user who read the dialog.
    InterlocutorReadDialog(Uuid),
}

impl Outbound {
    pub fn code(&self) -> &'static str {
        match self {
            Self::JoinResult(_) => "jr",
            Self::NewJoin(_) => "nj",
            Self::Disconnect(_) => "d",
            Self::SendMessageResult(_) => "smr",
            Self::ReceiveMessage(_) => "rm",
            Self::GetMessagesResult(_) => "gmr",
            Self::InterlocutorReadDialog(_) => "ird",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::JoinResult(JoinResult::Joined { user, online, token }) => json!([0, user, online, token]),
            Self::JoinResult(JoinResult::Rejected(reason)) => json!([reason]),
            Self::NewJoin(user) | Self::Disconnect(user) => json!([user]),
            Self::SendMessageResult(SendMessageResult::Accepted { confirmation_hash, message_id, sent_at }) => {
                json!([0, confirmation_hash, message_id, sent_at])
            }
            Self::SendMessageResult(SendMessageResult::Rejected { reason, confirmation_hash }) => {
                json!([reason, confirmation_hash])
            }
            Self::ReceiveMessage(message) => json!([message]),
            Self::GetMessagesResult(GetMessagesResult::Found { target_user_id, messages }) => {
                json!([0, target_user_id, messages])
            }
            Self::GetMessagesResult(GetMessagesResult::Rejected(reason)) => json!([reason]),
            Self::InterlocutorReadDialog(reader_id) => json!([reader_id]),
        }
    }

    pub fn to_frame(&self) -> String {
        json!([self.code(), self.payload()]).to_string()
    }
}
