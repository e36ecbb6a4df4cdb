use std::sync::Arc;

use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    ChatError, ChatResult,
    messages::{Message, MessageParams},
};

use super::{
    Room,
    events::{DialogRequest, GetMessagesResult, Outbound, SendMessageRequest, SendMessageResult},
    session::Session,
};

const NOT_AUTHORISED: &str = "Not authorised!";

/// Resolves the token to the id it was issued for. A missing or empty token is
/// treated like a forged one.
fn authorise(room: &Room, token: Option<&str>) -> ChatResult<Uuid> {
    let token = token.filter(|token| !token.is_empty()).ok_or(ChatError::Unauthorized)?;
    Ok(room.tokens.resolve(token)?)
}

pub(crate) async fn send_message(room: &Arc<Room>, session: &Arc<Session>, request: SendMessageRequest) {
    let SendMessageRequest { message, token, confirmation_hash } = request;

    let rejected = |reason: String| {
        Outbound::SendMessageResult(SendMessageResult::Rejected {
            reason,
            confirmation_hash: confirmation_hash.clone(),
        })
    };

    match save_message(room, message, token.as_deref()).await {
        Ok(message) => {
            session.emit(&Outbound::SendMessageResult(SendMessageResult::Accepted {
                confirmation_hash: confirmation_hash.clone(),
                message_id: message.id,
                sent_at: message.sent_at,
            }));

            // offline recipients find it in the store next time they open the dialog
            if let Some(recipient) = room.presence.lookup_session(message.to) {
                if recipient.is_connected() {
                    recipient.emit(&Outbound::ReceiveMessage(message));
                }
            }
        }
        Err(ChatError::Validation(reason)) => session.emit(&rejected(reason)),
        Err(ChatError::Unauthorized) => session.emit(&rejected(NOT_AUTHORISED.to_owned())),
        Err(err) => error!(session = %session.id(), "sending message {confirmation_hash:?} failed: {err}"),
    }
}

async fn save_message(room: &Room, params: MessageParams, token: Option<&str>) -> ChatResult<Message> {
    // a session may only send as the identity its own token proves
    if authorise(room, token)? != params.from {
        return Err(ChatError::Unauthorized);
    }
    room.messages.save(params).await
}

pub(crate) async fn get_messages(room: &Arc<Room>, session: &Arc<Session>, request: DialogRequest) {
    let DialogRequest { target_user_id, token } = request;

    let found = async {
        let requester_id = authorise(room, Some(&token))?;
        room.messages.find(requester_id, target_user_id).await
    };

    let result = match found.await {
        Ok(messages) => GetMessagesResult::Found { target_user_id, messages },
        Err(ChatError::Validation(reason)) => GetMessagesResult::Rejected(reason),
        Err(ChatError::Unauthorized) => GetMessagesResult::Rejected(NOT_AUTHORISED.to_owned()),
        Err(err) => {
            error!(session = %session.id(), "fetching dialog with {target_user_id} failed: {err}");
            return;
        }
    };
    session.emit(&Outbound::GetMessagesResult(result));
}

/// Tells the other side of a dialog that it was read. Never answers the reader.
pub(crate) async fn read_dialog(room: &Arc<Room>, session: &Arc<Session>, request: DialogRequest) {
    let DialogRequest { target_user_id, token } = request;
    if token.is_empty() {
        return;
    }

    let reader_id = match authorise(room, Some(&token)) {
        Ok(reader_id) => reader_id,
        Err(err) => {
            debug!(session = %session.id(), "ignoring read receipt: {err}");
            return;
        }
    };

    if let Some(interlocutor) = room.presence.lookup_session(target_user_id) {
        interlocutor.emit(&Outbound::InterlocutorReadDialog(reader_id));
    }
}
