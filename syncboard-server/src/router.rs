//! Task broadcast router: the realtime sync core.
//!
//! Every inbound intent flows through [`TaskRouter::handle`]:
//! validated against the session's bound identity, persisted through the
//! task store, re-read with derived display fields, mapped to the wire
//! representation, and finally dispatched: to the originating session
//! always, and to the other members of the task's team room when the task
//! is team-scoped. The originating session is itself a room member, so the
//! room path explicitly excludes it; a creator sees each event exactly
//! once.
//!
//! Errors never cross this boundary. An unauthenticated mutation or a
//! vanished task id is a silent no-op toward the client (the wire contract
//! has no mutation-error event), and a store fault aborts the operation
//! before any dispatch; all three are logged for operational visibility.

use syncboard_proto::event::{ClientEvent, ServerEvent};
use syncboard_proto::task::{Task, TaskDraft, TaskStatus};

use crate::mapper;
use crate::rooms::RoomRegistry;
use crate::session::{SessionId, SessionRegistry};
use crate::store::TaskStore;

/// The event dispatcher wiring sessions, rooms, and the task store.
pub struct TaskRouter {
    sessions: SessionRegistry,
    rooms: RoomRegistry,
    store: TaskStore,
}

impl TaskRouter {
    /// Creates a router with empty registries over the given store.
    #[must_use]
    pub fn new(store: TaskStore) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            rooms: RoomRegistry::new(),
            store,
        }
    }

    /// The session registry.
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// The room membership registry.
    #[must_use]
    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// The underlying task store.
    #[must_use]
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Registers a freshly connected session. Nothing is sent until the
    /// client binds an identity.
    pub async fn connect(
        &self,
        session: SessionId,
        outbound: tokio::sync::mpsc::UnboundedSender<ServerEvent>,
    ) {
        self.sessions.register(session, outbound).await;
    }

    /// Tears down a session: room membership first, then the record itself.
    pub async fn disconnect(&self, session: SessionId) {
        self.rooms.leave_any(session).await;
        self.sessions.unregister(session).await;
    }

    /// Routes one inbound intent to completion.
    pub async fn handle(&self, session: SessionId, event: ClientEvent) {
        match event {
            ClientEvent::SetUser(user_id) => self.set_user(session, user_id).await,
            ClientEvent::JoinTeam(team_id) => self.join_team(session, team_id).await,
            ClientEvent::LeaveTeam => self.leave_team(session).await,
            ClientEvent::GetTasks => self.refresh(session).await,
            ClientEvent::TaskCreate(draft) => self.create(session, draft).await,
            ClientEvent::TaskUpdated(task) => self.update(session, task).await,
            ClientEvent::TaskMove { id, new_status } => {
                self.move_task(session, &id, new_status).await;
            }
            ClientEvent::TaskDelete(id) => self.delete(session, &id).await,
        }
    }

    // --- Identity and room transitions -----------------------------------

    async fn set_user(&self, session: SessionId, user_id: i64) {
        self.rooms.leave_any(session).await;
        if !self.sessions.bind_user(session, user_id).await {
            return;
        }
        tracing::info!(session_id = %session, user_id, "identity bound");
        self.send_personal_snapshot(session, user_id).await;
    }

    async fn join_team(&self, session: SessionId, team_id: i64) {
        if !self.sessions.set_room(session, Some(team_id)).await {
            return;
        }
        self.rooms.join(session, team_id).await;
        tracing::info!(session_id = %session, team_id, "joined team room");
        self.send_team_snapshot(session, team_id).await;
    }

    async fn leave_team(&self, session: SessionId) {
        let left = self.rooms.leave_any(session).await;
        if !self.sessions.set_room(session, None).await {
            return;
        }
        if let Some(team_id) = left {
            tracing::info!(session_id = %session, team_id, "left team room");
        }
        match self.sessions.user_of(session).await {
            Some(user_id) => self.send_personal_snapshot(session, user_id).await,
            None => {
                tracing::debug!(session_id = %session, "leave:team without bound identity");
            }
        }
    }

    async fn refresh(&self, session: SessionId) {
        match self.sessions.user_of(session).await {
            Some(user_id) => self.send_personal_snapshot(session, user_id).await,
            None => {
                tracing::debug!(session_id = %session, "get:tasks without bound identity, dropping");
            }
        }
    }

    // --- Task mutations ---------------------------------------------------

    async fn create(&self, session: SessionId, draft: TaskDraft) {
        let Some(user_id) = self.sessions.user_of(session).await else {
            tracing::warn!(session_id = %session, "task:create without bound identity, dropping");
            return;
        };
        if draft.title.trim().is_empty() {
            tracing::warn!(session_id = %session, "task:create with empty title, dropping");
            return;
        }
        // Effective scope: explicit teamId, else the session's room, else personal.
        let team_id = match draft.team_id {
            Some(team) => Some(team),
            None => self.sessions.room_of(session).await,
        };
        let id = match self.store.insert_task(user_id, &draft, team_id).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(session_id = %session, error = %e, "task insert failed");
                return;
            }
        };
        tracing::info!(session_id = %session, task_id = id, team_id = ?team_id, "task created");
        let Some(task) = self.load_task(id).await else {
            return;
        };
        let scope = task.team_id;
        self.dispatch(session, scope, ServerEvent::TaskCreated(task)).await;
    }

    async fn update(&self, session: SessionId, task: Task) {
        if self.sessions.user_of(session).await.is_none() {
            tracing::warn!(session_id = %session, "task:updated without bound identity, dropping");
            return;
        }
        if task.title.trim().is_empty() {
            tracing::warn!(session_id = %session, "task:updated with empty title, dropping");
            return;
        }
        let Some(id) = parse_wire_id(&task.id) else {
            tracing::debug!(task_id = %task.id, "task:updated with non-numeric id, no-op");
            return;
        };
        let rows = match self
            .store
            .update_task(
                id,
                &task.title,
                task.description.as_deref(),
                task.status,
                task.priority,
                task.category,
                task.assigned_to,
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(task_id = id, error = %e, "task update failed");
                return;
            }
        };
        if rows == 0 {
            tracing::debug!(task_id = id, "task:updated for missing id, no-op");
            return;
        }
        let Some(mapped) = self.load_task(id).await else {
            return;
        };
        let scope = mapped.team_id;
        self.dispatch(session, scope, ServerEvent::TaskUpdated(mapped)).await;
    }

    async fn move_task(&self, session: SessionId, id_text: &str, new_status: TaskStatus) {
        if self.sessions.user_of(session).await.is_none() {
            tracing::warn!(session_id = %session, "task:move without bound identity, dropping");
            return;
        }
        let Some(id) = parse_wire_id(id_text) else {
            tracing::debug!(task_id = %id_text, "task:move with non-numeric id, no-op");
            return;
        };
        let rows = match self.store.move_task(id, new_status).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(task_id = id, error = %e, "task move failed");
                return;
            }
        };
        if rows == 0 {
            tracing::debug!(task_id = id, "task:move for missing id, no-op");
            return;
        }
        tracing::info!(task_id = id, status = %new_status, "task moved");
        let Some(mapped) = self.load_task(id).await else {
            return;
        };
        let scope = mapped.team_id;
        self.dispatch(session, scope, ServerEvent::TaskUpdated(mapped)).await;
    }

    async fn delete(&self, session: SessionId, id_text: &str) {
        if self.sessions.user_of(session).await.is_none() {
            tracing::warn!(session_id = %session, "task:delete without bound identity, dropping");
            return;
        }
        let Some(id) = parse_wire_id(id_text) else {
            tracing::debug!(task_id = %id_text, "task:delete with non-numeric id, no-op");
            return;
        };
        // Scope is resolved before the row disappears, so the room can
        // still be notified afterwards.
        let scope = match self.store.team_scope(id).await {
            Ok(Some(scope)) => scope,
            Ok(None) => {
                tracing::debug!(task_id = id, "task:delete for missing id, no-op");
                return;
            }
            Err(e) => {
                tracing::error!(task_id = id, error = %e, "task scope lookup failed");
                return;
            }
        };
        let rows = match self.store.delete_task(id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(task_id = id, error = %e, "task delete failed");
                return;
            }
        };
        if rows == 0 {
            tracing::debug!(task_id = id, "task vanished before delete, no-op");
            return;
        }
        tracing::info!(task_id = id, team_id = ?scope, "task deleted");
        self.dispatch(session, scope, ServerEvent::TaskDeleted(id.to_string())).await;
    }

    // --- Snapshots and dispatch -------------------------------------------

    async fn send_personal_snapshot(&self, session: SessionId, user_id: i64) {
        let rows = match self.store.personal_board(user_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(user_id, error = %e, "personal board read failed");
                return;
            }
        };
        match mapper::tasks_from_rows(rows) {
            Ok(tasks) => {
                self.sessions.send_to(session, ServerEvent::SyncTasks(tasks)).await;
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "corrupt row in personal board");
            }
        }
    }

    async fn send_team_snapshot(&self, session: SessionId, team_id: i64) {
        let rows = match self.store.team_board(team_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(team_id, error = %e, "team board read failed");
                return;
            }
        };
        match mapper::tasks_from_rows(rows) {
            Ok(tasks) => {
                self.sessions.send_to(session, ServerEvent::SyncTeamTasks(tasks)).await;
            }
            Err(e) => {
                tracing::error!(team_id, error = %e, "corrupt row in team board");
            }
        }
    }

    /// Re-reads a persisted task with its display names, absorbing faults.
    async fn load_task(&self, id: i64) -> Option<Task> {
        match self.store.fetch_task(id).await {
            Ok(Some(row)) => match mapper::task_from_row(row) {
                Ok(task) => Some(task),
                Err(e) => {
                    tracing::error!(task_id = id, error = %e, "corrupt task row");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(task_id = id, "task vanished before re-read");
                None
            }
            Err(e) => {
                tracing::error!(task_id = id, error = %e, "task re-read failed");
                None
            }
        }
    }

    /// Emits an event to the originating session and, for a team-scoped
    /// task, to the other members of that team's room.
    async fn dispatch(&self, origin: SessionId, scope: Option<i64>, event: ServerEvent) {
        if let Some(team_id) = scope {
            let members = self.rooms.members(team_id).await;
            let delivered = self.sessions.broadcast_excluding(members, origin, &event).await;
            tracing::debug!(team_id, delivered, "room dispatch");
        }
        self.sessions.send_to(origin, event).await;
    }
}

/// Wire task ids are text; anything non-numeric cannot exist in the store
/// and is treated as not-found.
fn parse_wire_id(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}
