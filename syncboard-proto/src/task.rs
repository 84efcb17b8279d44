//! Wire task model for Syncboard.
//!
//! Defines the task representation exchanged over the event channel, its
//! enumerated fields, and the creation draft sent by clients. The wire task
//! always carries its id as text, independent of the store's native numeric
//! type; the derived display names (`assignedToName`, `createdByName`) are
//! computed at read time and never stored.

use serde::{Deserialize, Serialize};

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 256;

/// Error returned when a stored label does not match any known variant.
#[derive(Debug, thiserror::Error)]
#[error("unknown {field} label: {label:?}")]
pub struct UnknownLabel {
    /// Which field carried the bad label.
    pub field: &'static str,
    /// The label that failed to parse.
    pub label: String,
}

/// Board column a task currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Task is open and not started.
    #[serde(rename = "todo")]
    Todo,
    /// Task is actively being worked on.
    #[serde(rename = "in-progress")]
    InProgress,
    /// Task has been completed.
    #[serde(rename = "done")]
    Done,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Todo => write!(f, "todo"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Done => write!(f, "done"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Self::Todo),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(UnknownLabel {
                field: "status",
                label: other.to_string(),
            }),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            other => Err(UnknownLabel {
                field: "priority",
                label: other.to_string(),
            }),
        }
    }
}

/// Task category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    /// A defect.
    Bug,
    /// New functionality.
    Feature,
    /// An improvement to existing functionality.
    Enhancement,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bug => write!(f, "Bug"),
            Self::Feature => write!(f, "Feature"),
            Self::Enhancement => write!(f, "Enhancement"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bug" => Ok(Self::Bug),
            "Feature" => Ok(Self::Feature),
            "Enhancement" => Ok(Self::Enhancement),
            other => Err(UnknownLabel {
                field: "category",
                label: other.to_string(),
            }),
        }
    }
}

/// A task as it appears on the wire.
///
/// `teamId` and `assignedTo` serialize as explicit `null` when unset so
/// clients can distinguish a personal task from one missing the field
/// entirely; the derived display names are omitted when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task id, always text on the wire.
    pub id: String,
    /// Task title (non-empty).
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current board column.
    pub status: TaskStatus,
    /// Priority label.
    pub priority: Priority,
    /// Category label.
    pub category: Category,
    /// RFC 3339 creation timestamp, immutable after creation.
    pub created_at: String,
    /// Owning team, `None` for a personal task.
    #[serde(default)]
    pub team_id: Option<i64>,
    /// Assigned user id, if any.
    #[serde(default)]
    pub assigned_to: Option<i64>,
    /// Display name of the assignee, derived at read time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_name: Option<String>,
    /// Display name of the creator, derived at read time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
}

/// Payload of a `task:create` intent.
///
/// The `status` field is accepted so that clients sending one do not fail
/// to decode, but it is never honored: the server is authoritative on
/// initial status and every created task starts in `todo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    /// Task title (non-empty).
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Priority label.
    pub priority: Priority,
    /// Category label.
    pub category: Category,
    /// Explicit team scope; falls back to the session's current room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<i64>,
    /// Assigned user id, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<i64>,
    /// Ignored; initial status is always `todo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}
