use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::users::User;

use super::session::Session;

/// Who is online. A username or user id is present iff exactly one live session
/// is joined under it; the three maps only ever change together, under one lock.
#[derive(Default)]
pub struct PresenceDirectory {
    inner: Mutex<Directory>,
}

#[derive(Default)]
struct Directory {
    session_by_user_id: HashMap<Uuid, Arc<Session>>,
    usernames_online: HashSet<String>,
    /// Joined users in join order.
    users: Vec<User>,
}

impl PresenceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, changing nothing, if the username or id is already online.
    pub fn register(&self, user: User, session: Arc<Session>) -> bool {
        let mut directory = self.inner.lock();
        if directory.usernames_online.contains(&user.username)
            || directory.session_by_user_id.contains_key(&user.id)
        {
            return false;
        }

        directory.session_by_user_id.insert(user.id, session);
        directory.usernames_online.insert(user.username.clone());
        directory.users.push(user);
        true
    }

    /// Returns false if the user was not online.
    pub fn unregister(&self, user: &User) -> bool {
        let mut directory = self.inner.lock();
        if directory.session_by_user_id.remove(&user.id).is_none() {
            return false;
        }

        directory.usernames_online.remove(&user.username);
        directory.users.retain(|online| online.id != user.id);
        true
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.inner.lock().usernames_online.contains(username)
    }

    pub fn list_online(&self) -> Vec<User> {
        self.inner.lock().users.clone()
    }

    pub fn lookup_session(&self, user_id: Uuid) -> Option<Arc<Session>> {
        self.inner.lock().session_by_user_id.get(&user_id).cloned()
    }

    /// Queues `frame` for every session that has entered the room. Runs under the
    /// directory lock, so all listeners see announcements in the same order.
    pub(crate) fn announce(&self, frame: &str) {
        let directory = self.inner.lock();
        for session in directory.session_by_user_id.values() {
            if session.in_room() {
                session.send_frame(frame.to_owned());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
