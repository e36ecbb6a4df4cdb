mod events;
mod gate;
mod join;
mod msg;
mod presence;
mod session;
mod ws;

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::{AppState, messages::MessageStore, token::Tokens, users::UserStore};

pub use events::{
    DialogRequest, EventName, GetMessagesResult, InboundEvent, JoinRequest, JoinResult, Outbound,
    SendMessageRequest, SendMessageResult,
};
pub use gate::{ProtocolViolation, inspect, screen};
pub use presence::PresenceDirectory;
pub use session::Session;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::room_ws))
}

/// The single shared chat room: who is online, the admission queue for joins,
/// and the collaborators the handlers need.
pub struct Room {
    presence: PresenceDirectory,
    admission: join::AdmissionQueue,
    users: Arc<dyn UserStore>,
    messages: Arc<dyn MessageStore>,
    tokens: Tokens,
}

impl Room {
    pub fn new(
        users: Arc<dyn UserStore>,
        messages: Arc<dyn MessageStore>,
        tokens: Tokens,
    ) -> Self {
        Room {
            presence: PresenceDirectory::new(),
            admission: join::AdmissionQueue::default(),
            users,
            messages,
            tokens,
        }
    }

    pub fn presence(&self) -> &PresenceDirectory {
        &self.presence
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    /// Announces to every session that has entered the room.
    fn broadcast(&self, event: &Outbound) {
        self.presence.announce(&event.to_frame());
    }
}

/// Runs the handler for one screened inbound event to completion.
pub async fn dispatch(room: Arc<Room>, session: Arc<Session>, event: InboundEvent) {
    match event {
        InboundEvent::Join(request) => join::join_chat(&room, &session, request).await,
        InboundEvent::SendMessage(request) => msg::send_message(&room, &session, request).await,
        InboundEvent::GetMessages(request) => msg::get_messages(&room, &session, request).await,
        InboundEvent::Read(request) => msg::read_dialog(&room, &session, request).await,
    }
}
