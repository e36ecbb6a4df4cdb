use std::{net::SocketAddr, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::users::User;

use super::events::Outbound;

type Cleanup = Box<dyn FnOnce() + Send + 'static>;

/// One live connection: its outbound frame queue and, once joined, its identity.
pub struct Session {
    id: Uuid,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<String>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    identity: Option<User>,
    closed: bool,
    in_room: bool,
    cleanups: Vec<Cleanup>,
}

impl Session {
    /// The receiver yields every frame addressed to this connection, in order.
    pub fn new(peer: SocketAddr) -> (Arc<Session>, mpsc::UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Session {
            id: Uuid::now_v7(),
            peer,
            outbound,
            state: Mutex::default(),
        };
        (Arc::new(session), rx)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn identity(&self) -> Option<User> {
        self.state.lock().identity.clone()
    }

    /// A session gets at most one identity; returns false if it already has one.
    pub(crate) fn set_identity(&self, user: User) -> bool {
        let mut state = self.state.lock();
        if state.identity.is_some() {
            return false;
        }
        state.identity = Some(user);
        true
    }

    pub fn is_connected(&self) -> bool {
        !self.state.lock().closed && !self.outbound.is_closed()
    }

    pub fn emit(&self, event: &Outbound) {
        self.send_frame(event.to_frame());
    }

    /// Frames from every caller land on the same queue, so the client sees them
    /// in the order they were sent.
    pub(crate) fn send_frame(&self, frame: String) {
        if self.state.lock().closed {
            return;
        }
        let _ = self.outbound.send(frame);
    }

    /// From now on the session receives room-wide announcements.
    pub(crate) fn enter_room(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.in_room = true;
        }
    }

    pub fn in_room(&self) -> bool {
        let state = self.state.lock();
        state.in_room && !state.closed
    }

    /// Registers work to run when the connection closes. If it is already closed
    /// the cleanup runs right away.
    pub fn on_close(&self, cleanup: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock();
        if state.closed {
            drop(state);
            cleanup();
            return;
        }
        state.cleanups.push(Box::new(cleanup));
    }

    /// Idempotent. The session leaves the room before the cleanups run.
    pub fn close(&self) {
        let cleanups = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.in_room = false;
            std::mem::take(&mut state.cleanups)
        };

        for cleanup in cleanups {
            cleanup();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
