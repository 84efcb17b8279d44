//! Event channel wire types for Syncboard.
//!
//! Every frame on the channel is a JSON object shaped
//! `{"event": "<name>", "data": <payload>}`. Inbound frames decode into one
//! variant of [`ClientEvent`], the tagged union of intents, and outbound
//! frames are serialized from [`ServerEvent`]. A frame whose payload does
//! not match its event's contract fails to decode and is discarded by the
//! server; the channel itself carries no error events.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskDraft, TaskStatus};

/// Intents sent by clients.
///
/// The identity payloads (`set:user`, `join:team`) are numeric-coercible:
/// both a JSON number and its decimal-string form are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Bind the connection to a user; triggers a personal snapshot.
    #[serde(rename = "set:user")]
    SetUser(#[serde(deserialize_with = "coerce::numeric_id")] i64),

    /// Switch the connection into a team room; triggers a team snapshot.
    #[serde(rename = "join:team")]
    JoinTeam(#[serde(deserialize_with = "coerce::numeric_id")] i64),

    /// Leave the current team room and return to the personal context.
    #[serde(rename = "leave:team")]
    LeaveTeam,

    /// Re-send the caller's applicable personal task set.
    #[serde(rename = "get:tasks")]
    GetTasks,

    /// Create a task; initial status is always forced to `todo`.
    #[serde(rename = "task:create")]
    TaskCreate(TaskDraft),

    /// Replace every mutable field of a task, keyed by id.
    #[serde(rename = "task:updated")]
    TaskUpdated(Task),

    /// Status-only update, used when a card is dragged between columns.
    #[serde(rename = "task:move")]
    #[serde(rename_all = "camelCase")]
    TaskMove {
        /// Id of the task to move.
        id: String,
        /// Column the task was dropped into.
        new_status: TaskStatus,
    },

    /// Remove a task.
    #[serde(rename = "task:delete")]
    TaskDelete(String),
}

/// Events emitted by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Full personal snapshot, sent to one session only.
    #[serde(rename = "sync:tasks")]
    SyncTasks(Vec<Task>),

    /// Full team snapshot, sent to one session only.
    #[serde(rename = "sync:team-tasks")]
    SyncTeamTasks(Vec<Task>),

    /// A task was created.
    #[serde(rename = "task:created")]
    TaskCreated(Task),

    /// A task was updated (full replace or move).
    #[serde(rename = "task:updated")]
    TaskUpdated(Task),

    /// A task was deleted; carries only the id.
    #[serde(rename = "task:deleted")]
    TaskDeleted(String),
}

mod coerce {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumericId {
        Number(i64),
        Text(String),
    }

    /// Accepts a JSON number or its decimal-string form.
    pub(super) fn numeric_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match NumericId::deserialize(deserializer)? {
            NumericId::Number(n) => Ok(n),
            NumericId::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}
