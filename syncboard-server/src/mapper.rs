//! Row-to-wire task mapping.
//!
//! A pure transformation from a [`TaskRow`] to the wire [`Task`]: the
//! numeric rowid becomes text, the enum columns are parsed back into their
//! wire labels, and optional fields stay `None` when the row carried NULL.
//! Rows are only ever written through the validated wire enums, so a label
//! that fails to parse means the store itself is inconsistent; callers
//! treat that as a store fault.

use syncboard_proto::task::{Task, UnknownLabel};

use crate::store::TaskRow;

/// Maps a store row into its wire representation.
///
/// # Errors
///
/// Returns [`UnknownLabel`] if a status/priority/category column holds a
/// value outside the wire contract.
pub fn task_from_row(row: TaskRow) -> Result<Task, UnknownLabel> {
    Ok(Task {
        id: row.id.to_string(),
        title: row.title,
        description: row.description,
        status: row.status.parse()?,
        priority: row.priority.parse()?,
        category: row.category.parse()?,
        created_at: row.created_at,
        team_id: row.team_id,
        assigned_to: row.assigned_to,
        assigned_to_name: row.assigned_to_name,
        created_by_name: row.created_by_name,
    })
}

/// Maps a batch of rows, preserving order.
///
/// # Errors
///
/// Returns the first [`UnknownLabel`] encountered.
pub fn tasks_from_rows(rows: Vec<TaskRow>) -> Result<Vec<Task>, UnknownLabel> {
    rows.into_iter().map(task_from_row).collect()
}
