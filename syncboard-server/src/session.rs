//! Session registry: per-connection identity, room context, and outbound
//! delivery channel.
//!
//! One [`SessionRecord`] exists per live connection, created on connect and
//! removed on disconnect. Outbound events are handed to the connection's
//! writer task through an unbounded channel, so routing never blocks on a
//! slow socket. On a multi-threaded runtime the registry is the shared
//! mutable state the sync core touches, guarded by a single [`RwLock`].

use std::collections::HashMap;

use syncboard_proto::event::ServerEvent;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

/// Identifier of one live connection.
pub type SessionId = Uuid;

/// Server-side state for one live connection.
#[derive(Debug)]
struct SessionRecord {
    /// Bound user identity; `None` until `set:user` arrives.
    user_id: Option<i64>,
    /// Current team room; at most one at a time.
    team_id: Option<i64>,
    /// Channel to the connection's WebSocket writer task.
    outbound: mpsc::UnboundedSender<ServerEvent>,
}

/// Registry of live sessions keyed by session id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new session with its outbound sender.
    pub async fn register(&self, id: SessionId, outbound: mpsc::UnboundedSender<ServerEvent>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            SessionRecord {
                user_id: None,
                team_id: None,
                outbound,
            },
        );
    }

    /// Removes a session. Returns `true` if it existed.
    pub async fn unregister(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(&id).is_some()
    }

    /// Binds the session to a user and clears its room context. Returns
    /// `false` if the session is gone.
    pub async fn bind_user(&self, id: SessionId, user_id: i64) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(record) => {
                record.user_id = Some(user_id);
                record.team_id = None;
                true
            }
            None => false,
        }
    }

    /// Sets or clears the session's current room. Returns `false` if the
    /// session is gone.
    pub async fn set_room(&self, id: SessionId, team_id: Option<i64>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(record) => {
                record.team_id = team_id;
                true
            }
            None => false,
        }
    }

    /// The session's bound user id, if any.
    pub async fn user_of(&self, id: SessionId) -> Option<i64> {
        self.sessions.read().await.get(&id).and_then(|r| r.user_id)
    }

    /// The session's current room, if any.
    pub async fn room_of(&self, id: SessionId) -> Option<i64> {
        self.sessions.read().await.get(&id).and_then(|r| r.team_id)
    }

    /// Sends one event to one session. Returns `false` if the session is
    /// gone or its writer task has shut down.
    pub async fn send_to(&self, id: SessionId, event: ServerEvent) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(record) => record.outbound.send(event).is_ok(),
            None => false,
        }
    }

    /// Sends one event to every target except `exclude`, returning how many
    /// deliveries were handed off. Senders are collected under the read
    /// guard and used after it is released.
    pub async fn broadcast_excluding(
        &self,
        targets: impl IntoIterator<Item = SessionId>,
        exclude: SessionId,
        event: &ServerEvent,
    ) -> usize {
        let mut recipients = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for id in targets {
                if id == exclude {
                    continue;
                }
                if let Some(record) = sessions.get(&id) {
                    recipients.push(record.outbound.clone());
                }
            }
        }

        let mut sent = 0;
        for recipient in recipients {
            if recipient.send(event.clone()).is_ok() {
                sent += 1;
            }
        }
        sent
    }
}
