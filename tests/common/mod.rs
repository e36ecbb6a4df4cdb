#![allow(dead_code)]

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use parley::{
    ChatError, ChatResult, db,
    messages::SqliteMessages,
    rooms::{self, Room, Session, screen},
    token::Tokens,
    users::{SqliteUsers, User, UserStore},
};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const SECRET: &str = "test-secret";

/// Wraps the SQLite store. `delay` widens the window between the online check
/// and the registration of a join; `break_down` makes every call fail the way an
/// unreachable database would.
pub struct TestUsers {
    inner: SqliteUsers,
    delay: Duration,
    broken: AtomicBool,
}

impl TestUsers {
    pub fn break_down(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> ChatResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(ChatError::Internal(anyhow::anyhow!("user store is down")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for TestUsers {
    async fn find_by_id(&self, id: Uuid) -> ChatResult<Option<User>> {
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn find_or_create_by_username(&self, username: &str) -> ChatResult<User> {
        tokio::time::sleep(self.delay).await;
        self.check()?;
        self.inner.find_or_create_by_username(username).await
    }
}

pub async fn room() -> Arc<Room> {
    room_with_delay(Duration::ZERO).await
}

pub async fn room_with_delay(delay: Duration) -> Arc<Room> {
    room_with_users(delay).await.0
}

pub async fn room_with_users(delay: Duration) -> (Arc<Room>, Arc<TestUsers>) {
    let db_pool = db::connect_in_memory().await.unwrap();
    let users = Arc::new(TestUsers {
        inner: SqliteUsers::new(db_pool.clone()),
        delay,
        broken: AtomicBool::new(false),
    });
    let messages = Arc::new(SqliteMessages::new(db_pool, users.clone()));
    let room = Arc::new(Room::new(users.clone(), messages, Tokens::new(SECRET)));
    (room, users)
}

/// A connection without a socket: frames go through the gate and the handlers,
/// and whatever the server emits lands in `rx`.
pub struct Client {
    pub room: Arc<Room>,
    pub session: Arc<Session>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl Client {
    pub fn connect(room: &Arc<Room>) -> Client {
        let (session, rx) = Session::new("127.0.0.1:5555".parse().unwrap());
        Client { room: room.clone(), session, rx }
    }

    /// Screens the frame and runs its handler to completion. Returns false if
    /// the gate dropped the connection.
    pub async fn emit(&self, frame: Value) -> bool {
        let Some(event) = screen(&self.session, &frame.to_string()) else {
            return false;
        };
        rooms::dispatch(self.room.clone(), self.session.clone(), event).await;
        true
    }

    pub async fn next(&mut self) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(2), self.rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("session channel closed");
        serde_json::from_str(&frame).unwrap()
    }

    /// Next frame with the given code, skipping room chatter such as `nj`.
    pub async fn next_event(&mut self, code: &str) -> Value {
        loop {
            let frame = self.next().await;
            if frame[0] == code {
                return frame[1].clone();
            }
        }
    }

    /// Asserts nothing else arrives for a little while.
    pub async fn assert_silent(&mut self) {
        let waited = tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await;
        if let Ok(Some(frame)) = waited {
            panic!("unexpected frame {frame}");
        }
    }

    pub async fn join(&mut self, username: &str) -> Value {
        assert!(self.emit(json!(["j", [username]])).await);
        self.next_event("jr").await
    }

    /// Joins and returns the user and its token.
    pub async fn join_ok(&mut self, username: &str) -> (User, String) {
        let result = self.join(username).await;
        assert_eq!(result[0], 0, "join of {username} failed: {result}");
        let user: User = serde_json::from_value(result[1].clone()).unwrap();
        (user, result[3].as_str().unwrap().to_owned())
    }

    pub fn disconnect(&self) {
        self.session.close();
    }
}
