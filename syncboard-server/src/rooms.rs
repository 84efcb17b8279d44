//! Room membership registry.
//!
//! Maintains, for each team id, the set of sessions currently joined to
//! that team's broadcast room. Rooms are purely in-memory routing state:
//! they are rebuilt from join events and lost on restart, same as the
//! session registry. A session belongs to at most one room; joining a new
//! room removes the old membership inside the same write guard, so a
//! concurrent broadcast never observes a session in two rooms.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::session::SessionId;

/// In-memory directory of team rooms and their joined sessions.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<i64, HashSet<SessionId>>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Joins a session to a team room, leaving any other room first.
    /// Joining a room the session is already in is a no-op.
    pub async fn join(&self, session: SessionId, team_id: i64) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|id, members| {
            if *id != team_id {
                members.remove(&session);
            }
            !members.is_empty()
        });
        rooms.entry(team_id).or_default().insert(session);
    }

    /// Removes a session from one room. Leaving a room the session is not
    /// in is a no-op.
    pub async fn leave(&self, session: SessionId, team_id: i64) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(&team_id) {
            members.remove(&session);
            if members.is_empty() {
                rooms.remove(&team_id);
            }
        }
    }

    /// Removes a session from whatever room it is in, returning that room's
    /// team id if there was one. Used on identity reset and disconnect.
    pub async fn leave_any(&self, session: SessionId) -> Option<i64> {
        let mut rooms = self.rooms.write().await;
        let team_id = rooms
            .iter()
            .find(|(_, members)| members.contains(&session))
            .map(|(id, _)| *id)?;
        if let Some(members) = rooms.get_mut(&team_id) {
            members.remove(&session);
            if members.is_empty() {
                rooms.remove(&team_id);
            }
        }
        Some(team_id)
    }

    /// Current members of one room.
    pub async fn members(&self, team_id: i64) -> Vec<SessionId> {
        let rooms = self.rooms.read().await;
        rooms
            .get(&team_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether a session is currently joined to the given room.
    pub async fn contains(&self, team_id: i64, session: SessionId) -> bool {
        let rooms = self.rooms.read().await;
        rooms.get(&team_id).is_some_and(|members| members.contains(&session))
    }
}
