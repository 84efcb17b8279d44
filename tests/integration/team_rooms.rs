//! Integration tests for team rooms.
//!
//! Multi-client scenarios: room-scoped fan-out on create/update/delete,
//! exclusive room membership across `join:team` switches, and the
//! leave-team return to the personal context.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use syncboard_proto::codec;
use syncboard_proto::event::{ClientEvent, ServerEvent};
use syncboard_proto::task::{Category, Priority, TaskDraft, TaskStatus};
use syncboard_server::router::TaskRouter;
use syncboard_server::server::start_server_with_state;
use syncboard_server::store::TaskStore;
use tokio_tungstenite::tungstenite;

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

async fn start_test_server() -> (std::net::SocketAddr, Arc<TaskRouter>) {
    let store = TaskStore::in_memory().await.expect("in-memory store");
    let router = Arc::new(TaskRouter::new(store));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&router))
        .await
        .expect("failed to start test server");
    (addr, router)
}

async fn connect(addr: std::net::SocketAddr) -> WsClient {
    let url = format!("ws://{addr}/ws");
    let (ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    ws
}

async fn send(ws: &mut WsClient, event: &ClientEvent) {
    let text = codec::encode_client(event).unwrap();
    ws.send(tungstenite::Message::Text(text.into())).await.unwrap();
}

async fn recv(ws: &mut WsClient) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let msg = ws.next().await.unwrap().unwrap();
            if let tungstenite::Message::Text(text) = msg {
                return codec::decode_server(text.as_str()).unwrap();
            }
        }
    })
    .await
    .expect("timed out waiting for a server event")
}

async fn assert_silent(ws: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

/// Connects a client, binds its identity, and joins a team room, draining
/// both snapshots.
async fn join_as(addr: std::net::SocketAddr, user: i64, team: i64) -> WsClient {
    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(user)).await;
    let _personal = recv(&mut ws).await;
    send(&mut ws, &ClientEvent::JoinTeam(team)).await;
    let _team = recv(&mut ws).await;
    ws
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: None,
        priority: Priority::Medium,
        category: Category::Feature,
        team_id: None,
        assigned_to: None,
        status: None,
    }
}

/// Seeds two teammates, one outsider, and a team.
async fn seed(router: &TaskRouter) -> (i64, i64, i64, i64) {
    let store = router.store();
    let ada = store.create_user("Ada", "ada@example.com").await.unwrap();
    let grace = store.create_user("Grace", "grace@example.com").await.unwrap();
    let lin = store.create_user("Lin", "lin@example.com").await.unwrap();
    let team = store.create_team("Core", ada).await.unwrap();
    store.add_member(team, grace).await.unwrap();
    (ada, grace, lin, team)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn team_create_reaches_creator_and_room_but_not_outsiders() {
    let (addr, router) = start_test_server().await;
    let (ada, grace, lin, team) = seed(&router).await;

    let mut creator = join_as(addr, ada, team).await;
    let mut member = join_as(addr, grace, team).await;
    // The assignee is connected but never joins the room.
    let mut outsider = connect(addr).await;
    send(&mut outsider, &ClientEvent::SetUser(lin)).await;
    let _personal = recv(&mut outsider).await;

    let mut d = draft("team work");
    d.assigned_to = Some(lin);
    send(&mut creator, &ClientEvent::TaskCreate(d)).await;

    // Creator receives exactly one copy, via the direct emit.
    let ServerEvent::TaskCreated(task) = recv(&mut creator).await else {
        panic!("expected task:created at the creator");
    };
    assert_eq!(task.team_id, Some(team));
    assert_eq!(task.assigned_to, Some(lin));
    assert_eq!(task.assigned_to_name.as_deref(), Some("Lin"));
    assert_eq!(task.created_by_name.as_deref(), Some("Ada"));
    assert_silent(&mut creator).await;

    // Room member receives it once via the room path.
    let ServerEvent::TaskCreated(seen) = recv(&mut member).await else {
        panic!("expected task:created at the member");
    };
    assert_eq!(seen.id, task.id);
    assert_silent(&mut member).await;

    // The assignee outside the room receives nothing.
    assert_silent(&mut outsider).await;
}

#[tokio::test]
async fn moves_and_deletes_propagate_through_the_room() {
    let (addr, router) = start_test_server().await;
    let (ada, grace, _lin, team) = seed(&router).await;

    let mut creator = join_as(addr, ada, team).await;
    let mut member = join_as(addr, grace, team).await;

    send(&mut creator, &ClientEvent::TaskCreate(draft("shared"))).await;
    let ServerEvent::TaskCreated(task) = recv(&mut creator).await else {
        panic!("expected task:created");
    };
    let _seen = recv(&mut member).await;

    // A different member moves the task; both ends converge.
    send(
        &mut member,
        &ClientEvent::TaskMove {
            id: task.id.clone(),
            new_status: TaskStatus::InProgress,
        },
    )
    .await;
    let ServerEvent::TaskUpdated(at_member) = recv(&mut member).await else {
        panic!("expected task:updated at the mover");
    };
    let ServerEvent::TaskUpdated(at_creator) = recv(&mut creator).await else {
        panic!("expected task:updated at the creator");
    };
    assert_eq!(at_member.status, TaskStatus::InProgress);
    assert_eq!(at_creator.status, TaskStatus::InProgress);

    // Delete fans out a bare id.
    send(&mut creator, &ClientEvent::TaskDelete(task.id.clone())).await;
    assert_eq!(recv(&mut creator).await, ServerEvent::TaskDeleted(task.id.clone()));
    assert_eq!(recv(&mut member).await, ServerEvent::TaskDeleted(task.id.clone()));
}

#[tokio::test]
async fn full_update_propagates_new_fields_to_the_room() {
    let (addr, router) = start_test_server().await;
    let (ada, grace, lin, team) = seed(&router).await;

    let mut creator = join_as(addr, ada, team).await;
    let mut member = join_as(addr, grace, team).await;

    send(&mut creator, &ClientEvent::TaskCreate(draft("draft title"))).await;
    let ServerEvent::TaskCreated(mut task) = recv(&mut creator).await else {
        panic!("expected task:created");
    };
    let _seen = recv(&mut member).await;

    task.title = "final title".to_string();
    task.priority = Priority::High;
    task.assigned_to = Some(lin);
    send(&mut creator, &ClientEvent::TaskUpdated(task)).await;

    let ServerEvent::TaskUpdated(updated) = recv(&mut member).await else {
        panic!("expected task:updated at the member");
    };
    assert_eq!(updated.title, "final title");
    assert_eq!(updated.priority, Priority::High);
    assert_eq!(updated.assigned_to, Some(lin));
    // Display name re-derived on the read path after the write.
    assert_eq!(updated.assigned_to_name.as_deref(), Some("Lin"));
}

#[tokio::test]
async fn switching_teams_ends_old_room_deliveries() {
    let (addr, router) = start_test_server().await;
    let (ada, grace, _lin, core) = seed(&router).await;
    let infra = router.store().create_team("Infra", grace).await.unwrap();

    let mut creator = join_as(addr, ada, core).await;
    let mut drifter = join_as(addr, grace, core).await;

    // Drifter switches rooms; the old membership must be gone.
    send(&mut drifter, &ClientEvent::JoinTeam(infra)).await;
    let ServerEvent::SyncTeamTasks(tasks) = recv(&mut drifter).await else {
        panic!("expected sync:team-tasks for the new room");
    };
    assert!(tasks.is_empty());

    send(&mut creator, &ClientEvent::TaskCreate(draft("core only"))).await;
    let _created = recv(&mut creator).await;
    assert_silent(&mut drifter).await;
}

#[tokio::test]
async fn join_team_snapshot_covers_the_whole_team_board() {
    let (addr, router) = start_test_server().await;
    let (ada, grace, _lin, team) = seed(&router).await;
    // Pre-existing team tasks from both members.
    router.store().insert_task(ada, &draft("one"), Some(team)).await.unwrap();
    router.store().insert_task(grace, &draft("two"), Some(team)).await.unwrap();

    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(grace)).await;
    let _personal = recv(&mut ws).await;
    send(&mut ws, &ClientEvent::JoinTeam(team)).await;

    let ServerEvent::SyncTeamTasks(tasks) = recv(&mut ws).await else {
        panic!("expected sync:team-tasks");
    };
    // Both tasks, newest first.
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "two");
    assert_eq!(tasks[1].title, "one");
}

#[tokio::test]
async fn leave_team_returns_to_the_personal_board() {
    let (addr, router) = start_test_server().await;
    let (ada, _grace, _lin, team) = seed(&router).await;
    router.store().insert_task(ada, &draft("personal"), None).await.unwrap();

    let mut ws = join_as(addr, ada, team).await;
    send(&mut ws, &ClientEvent::LeaveTeam).await;

    let ServerEvent::SyncTasks(tasks) = recv(&mut ws).await else {
        panic!("expected sync:tasks after leave:team");
    };
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "personal");

    // No longer in the room: team events stop arriving.
    let mut teammate = join_as(addr, ada, team).await;
    send(&mut teammate, &ClientEvent::TaskCreate(draft("after leave"))).await;
    let _created = recv(&mut teammate).await;
    assert_silent(&mut ws).await;
}
