//! Task store adapter backed by SQLite.
//!
//! The store is the sole durable owner of task state: the sync core never
//! caches tasks across connections, so every snapshot and every
//! post-mutation event re-derives its rows from here. Board reads join the
//! users table twice to produce the derived display names
//! (`assigned_to_name`, `created_by_name`) that are never stored on the
//! task row itself.
//!
//! Mutations deliberately carry no optimistic-concurrency check: a
//! full-record update or a single-field move simply overwrites whatever is
//! there, and the number of affected rows tells the router whether the
//! target still existed.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use syncboard_proto::task::{Category, Priority, TaskDraft, TaskStatus};

/// Errors surfaced by the store adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Schema migration failed at startup.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// A task row as read from the store, display names already joined in.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub team_id: Option<i64>,
    pub created_by: i64,
    pub assigned_to: Option<i64>,
    pub created_at: String,
    pub assigned_to_name: Option<String>,
    pub created_by_name: Option<String>,
}

/// A user row, as exposed to member lists and search.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
}

/// A team row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TeamRow {
    pub id: i64,
    pub name: String,
    pub created_by: i64,
}

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.status, t.priority, \
     t.category, t.team_id, t.created_by, t.assigned_to, t.created_at, \
     a.name AS assigned_to_name, c.name AS created_by_name \
     FROM tasks t \
     LEFT JOIN users a ON a.id = t.assigned_to \
     LEFT JOIN users c ON c.id = t.created_by";

/// SQLite-backed task store.
///
/// Cheap to clone; the pool is `Arc`-backed.
#[derive(Clone)]
pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    /// Opens (creating if missing) the database at `database_url` and runs
    /// pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    pub async fn open(database_url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts).await?;
        Self::from_pool(pool).await
    }

    /// Opens an in-memory database for tests.
    ///
    /// The pool is pinned to a single eternal connection: each SQLite
    /// `:memory:` connection is its own database, so a second connection
    /// would see an empty schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database cannot be opened or migrated.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    // --- Task reads -------------------------------------------------------

    /// Rows applicable to one user's personal board: personal tasks they
    /// own, plus any task (personal or team) assigned to them. Newest
    /// creation first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn personal_board(&self, user_id: i64) -> Result<Vec<TaskRow>, StoreError> {
        let query = format!(
            "{TASK_SELECT} WHERE (t.created_by = ? AND t.team_id IS NULL) OR t.assigned_to = ? \
             ORDER BY t.created_at DESC, t.id DESC"
        );
        Ok(sqlx::query_as(&query)
            .bind(user_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// All rows scoped to one team, irrespective of owner or assignee.
    /// Newest creation first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn team_board(&self, team_id: i64) -> Result<Vec<TaskRow>, StoreError> {
        let query = format!(
            "{TASK_SELECT} WHERE t.team_id = ? ORDER BY t.created_at DESC, t.id DESC"
        );
        Ok(sqlx::query_as(&query)
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// A single task row with display names, or `None` if the id vanished.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn fetch_task(&self, id: i64) -> Result<Option<TaskRow>, StoreError> {
        let query = format!("{TASK_SELECT} WHERE t.id = ?");
        Ok(sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// The team scope of a task: `None` if the task does not exist,
    /// `Some(None)` for a personal task, `Some(Some(team_id))` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn team_scope(&self, id: i64) -> Result<Option<Option<i64>>, StoreError> {
        Ok(
            sqlx::query_scalar::<_, Option<i64>>("SELECT team_id FROM tasks WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    // --- Task writes ------------------------------------------------------

    /// Inserts a new task and returns its id. The initial status is always
    /// `todo`; any status in the draft is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on insert failure.
    pub async fn insert_task(
        &self,
        created_by: i64,
        draft: &TaskDraft,
        team_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO tasks (title, description, status, priority, category, team_id, \
             created_by, assigned_to, created_at) \
             VALUES (?, ?, 'todo', ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.priority.to_string())
        .bind(draft.category.to_string())
        .bind(team_id)
        .bind(created_by)
        .bind(draft.assigned_to)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Full-field replace keyed by id: title, description, status,
    /// priority, category, assignee. Team scope and creation metadata are
    /// immutable. Returns the number of rows touched (0 ⇒ the id vanished).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on update failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_task(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
        status: TaskStatus,
        priority: Priority,
        category: Category,
        assigned_to: Option<i64>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, \
             category = ?, assigned_to = ? WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(status.to_string())
        .bind(priority.to_string())
        .bind(category.to_string())
        .bind(assigned_to)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Status-only replace. Returns the number of rows touched (0 ⇒ no such
    /// task, which callers treat as a soft no-op).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on update failure.
    pub async fn move_task(&self, id: i64, status: TaskStatus) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE tasks SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Deletes a task. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on delete failure.
    pub async fn delete_task(&self, id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // --- Users, teams, membership ----------------------------------------

    /// Creates a user and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on insert failure (including duplicate email).
    pub async fn create_user(&self, name: &str, email: &str) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query("INSERT INTO users (name, email, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Creates a team with its creator as the first member; returns the
    /// team id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on insert failure.
    pub async fn create_team(&self, name: &str, created_by: i64) -> Result<i64, StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO teams (name, created_by, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(created_by)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        let team_id = result.last_insert_rowid();
        sqlx::query("INSERT INTO team_members (team_id, user_id, added_at) VALUES (?, ?, ?)")
            .bind(team_id)
            .bind(created_by)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(team_id)
    }

    /// Adds a member to a team; re-adding an existing member is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on insert failure.
    pub async fn add_member(&self, team_id: i64, user_id: i64) -> Result<(), StoreError> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO team_members (team_id, user_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(team_id)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes a member from a team. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on delete failure.
    pub async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Teams the given user belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn teams_for_user(&self, user_id: i64) -> Result<Vec<TeamRow>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT tm.id, tm.name, tm.created_by FROM teams tm \
             INNER JOIN team_members m ON m.team_id = tm.id \
             WHERE m.user_id = ? ORDER BY tm.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Member list of one team.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn team_members(&self, team_id: i64) -> Result<Vec<UserRow>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT u.id, u.name, u.email FROM users u \
             INNER JOIN team_members m ON m.user_id = u.id \
             WHERE m.team_id = ? ORDER BY u.id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Users whose email contains the given fragment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on query failure.
    pub async fn search_users(&self, email_fragment: &str) -> Result<Vec<UserRow>, StoreError> {
        Ok(sqlx::query_as(
            "SELECT id, name, email FROM users \
             WHERE email LIKE '%' || ? || '%' ORDER BY id",
        )
        .bind(email_fragment)
        .fetch_all(&self.pool)
        .await?)
    }
}
