use std::{future::Future, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::{
    ChatError, ChatResult,
    users::{User, validate_username},
};

use super::{
    Room,
    events::{JoinRequest, JoinResult, Outbound},
    session::Session,
};

const USERNAME_TAKEN: &str = "A user with such username is already in the chat!";
const BAD_TOKEN: &str = "Bad token!";
const ALREADY_JOINED: &str = "You have already joined the chat!";

/// Runs join handshakes one at a time, in arrival order, so the "is this username
/// online" check and the registration that follows it never interleave with
/// another join. tokio's mutex is fair, waiters acquire it in FIFO order.
#[derive(Default)]
pub(crate) struct AdmissionQueue {
    slot: Mutex<()>,
}

impl AdmissionQueue {
    pub(crate) async fn admit<F: Future>(&self, handshake: F) -> F::Output {
        let _slot = self.slot.lock().await;
        handshake.await
    }
}

pub(crate) async fn join_chat(room: &Arc<Room>, session: &Arc<Session>, request: JoinRequest) {
    room.admission
        .admit(async {
            match handshake(room, session, request).await {
                Ok(user) => debug!(session = %session.id(), "User with username {:?} joined the chat.", user.username),
                Err(ChatError::Validation(reason)) => reject(session, reason),
                Err(ChatError::Unauthorized) => reject(session, BAD_TOKEN.to_owned()),
                // no answer, the client times out and retries
                Err(err) => error!(session = %session.id(), "join failed: {err}"),
            }
        })
        .await
}

fn reject(session: &Session, reason: String) {
    session.emit(&Outbound::JoinResult(JoinResult::Rejected(reason)));
}

async fn handshake(room: &Arc<Room>, session: &Arc<Session>, request: JoinRequest) -> ChatResult<User> {
    if session.identity().is_some() {
        return Err(ChatError::validation(ALREADY_JOINED));
    }

    let JoinRequest { username, token } = request;
    let username = username.filter(|username| !username.is_empty());

    let restored = match (&username, token) {
        (None, Some(token)) => {
            let user_id = room.tokens.resolve(&token)?;
            Some(room.users.find_by_id(user_id).await?.ok_or(ChatError::Unauthorized)?)
        }
        _ => None,
    };

    let username = match &restored {
        Some(user) => user.username.trim().to_owned(),
        None => username.unwrap_or_default().trim().to_owned(),
    };

    if room.presence.is_online(&username) {
        return Err(ChatError::validation(USERNAME_TAKEN));
    }
    validate_username(&username)?;

    let user = match restored {
        Some(user) => user,
        None => room.users.find_or_create_by_username(&username).await?,
    };

    // nothing below awaits, so the directory can't change under us
    let online = room.presence.list_online();
    if !room.presence.register(user.clone(), session.clone()) {
        return Err(ChatError::validation(USERNAME_TAKEN));
    }
    session.set_identity(user.clone());

    room.broadcast(&Outbound::NewJoin(user.clone()));
    session.enter_room();

    let token = room.tokens.issue(user.id);
    session.emit(&Outbound::JoinResult(JoinResult::Joined {
        user: user.clone(),
        online,
        token,
    }));

    // Registered last: a connection that dropped while queued still gets the
    // whole handshake, then leaves right away.
    let departed = user.clone();
    let room = Arc::clone(room);
    let session_id = session.id();
    session.on_close(move || {
        if room.presence.unregister(&departed) {
            room.broadcast(&Outbound::Disconnect(departed.clone()));
            debug!(session = %session_id, "User with username {:?} disconnected.", departed.username);
        }
    });

    Ok(user)
}
