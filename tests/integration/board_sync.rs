//! Integration tests for the personal board flow.
//!
//! Drives a live server through WebSocket clients: identity binding,
//! snapshot delivery, create/move/refresh round trips, and the silent
//! no-op contract for vanished task ids.

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

/// Starts a server over a fresh in-memory store.
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

/// Receives the next server event, failing the test after two seconds.
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

/// Asserts that no event arrives within a short grace window.
async fn assert_silent(ws: &mut WsClient) {
    let result = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

fn draft(title: &str) -> TaskDraft {
    TaskDraft {
        title: title.to_string(),
        description: None,
        priority: Priority::High,
        category: Category::Bug,
        team_id: None,
        assigned_to: None,
        status: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn personal_create_emits_todo_to_the_creator_only() {
    let (addr, router) = start_test_server().await;
    let user = router.store().create_user("Ada", "ada@example.com").await.unwrap();

    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(user)).await;
    match recv(&mut ws).await {
        ServerEvent::SyncTasks(tasks) => assert!(tasks.is_empty()),
        other => panic!("expected sync:tasks, got {other:?}"),
    }

    let mut d = draft("Fix bug");
    d.status = Some(TaskStatus::Done); // must be overridden
    send(&mut ws, &ClientEvent::TaskCreate(d)).await;

    match recv(&mut ws).await {
        ServerEvent::TaskCreated(task) => {
            assert_eq!(task.title, "Fix bug");
            assert_eq!(task.status, TaskStatus::Todo);
            assert_eq!(task.team_id, None);
            assert_eq!(task.assigned_to, None);
            assert_eq!(task.priority, Priority::High);
            assert_eq!(task.category, Category::Bug);
        }
        other => panic!("expected task:created, got {other:?}"),
    }
    assert_silent(&mut ws).await;
}

#[tokio::test]
async fn refresh_returns_the_applicable_set() {
    let (addr, router) = start_test_server().await;
    let ada = router.store().create_user("Ada", "ada@example.com").await.unwrap();
    let grace = router.store().create_user("Grace", "grace@example.com").await.unwrap();
    let team = router.store().create_team("Core", grace).await.unwrap();

    // Ada's own personal task and a team task assigned to her.
    router.store().insert_task(ada, &draft("mine"), None).await.unwrap();
    let mut assigned = draft("assigned");
    assigned.assigned_to = Some(ada);
    router.store().insert_task(grace, &assigned, Some(team)).await.unwrap();
    // Grace's personal task must not leak into Ada's board.
    router.store().insert_task(grace, &draft("not mine"), None).await.unwrap();

    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(ada)).await;
    let _initial = recv(&mut ws).await;

    send(&mut ws, &ClientEvent::GetTasks).await;
    match recv(&mut ws).await {
        ServerEvent::SyncTasks(tasks) => {
            let mut titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
            titles.sort_unstable();
            assert_eq!(titles, vec!["assigned", "mine"]);
        }
        other => panic!("expected sync:tasks, got {other:?}"),
    }
}

#[tokio::test]
async fn move_of_a_vanished_id_is_a_silent_no_op() {
    let (addr, router) = start_test_server().await;
    let user = router.store().create_user("Ada", "ada@example.com").await.unwrap();

    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(user)).await;
    let _initial = recv(&mut ws).await;

    send(
        &mut ws,
        &ClientEvent::TaskMove {
            id: "424242".to_string(),
            new_status: TaskStatus::Done,
        },
    )
    .await;
    assert_silent(&mut ws).await;

    // The connection survives and keeps routing.
    send(&mut ws, &ClientEvent::GetTasks).await;
    assert!(matches!(recv(&mut ws).await, ServerEvent::SyncTasks(_)));
}

#[tokio::test]
async fn move_then_refresh_is_read_after_write_consistent() {
    let (addr, router) = start_test_server().await;
    let user = router.store().create_user("Ada", "ada@example.com").await.unwrap();

    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(user)).await;
    let _initial = recv(&mut ws).await;

    send(&mut ws, &ClientEvent::TaskCreate(draft("wip"))).await;
    let ServerEvent::TaskCreated(task) = recv(&mut ws).await else {
        panic!("expected task:created");
    };

    send(
        &mut ws,
        &ClientEvent::TaskMove {
            id: task.id.clone(),
            new_status: TaskStatus::Done,
        },
    )
    .await;
    let ServerEvent::TaskUpdated(moved) = recv(&mut ws).await else {
        panic!("expected task:updated");
    };
    assert_eq!(moved.status, TaskStatus::Done);

    send(&mut ws, &ClientEvent::GetTasks).await;
    let ServerEvent::SyncTasks(tasks) = recv(&mut ws).await else {
        panic!("expected sync:tasks");
    };
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, task.id);
    assert_eq!(tasks[0].status, TaskStatus::Done);
}

#[tokio::test]
async fn reconnecting_re_derives_the_board_from_the_store() {
    let (addr, router) = start_test_server().await;
    let user = router.store().create_user("Ada", "ada@example.com").await.unwrap();

    {
        let mut ws = connect(addr).await;
        send(&mut ws, &ClientEvent::SetUser(user)).await;
        let _initial = recv(&mut ws).await;
        send(&mut ws, &ClientEvent::TaskCreate(draft("durable"))).await;
        let _created = recv(&mut ws).await;
        ws.close(None).await.unwrap();
    }

    // A brand-new connection sees the task: nothing lives in the core.
    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::SetUser(user)).await;
    let ServerEvent::SyncTasks(tasks) = recv(&mut ws).await else {
        panic!("expected sync:tasks");
    };
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "durable");
}

#[tokio::test]
async fn mutations_before_set_user_are_dropped() {
    let (addr, router) = start_test_server().await;
    let user = router.store().create_user("Ada", "ada@example.com").await.unwrap();

    let mut ws = connect(addr).await;
    send(&mut ws, &ClientEvent::TaskCreate(draft("too early"))).await;
    assert_silent(&mut ws).await;

    // Binding afterwards shows the create never happened.
    send(&mut ws, &ClientEvent::SetUser(user)).await;
    let ServerEvent::SyncTasks(tasks) = recv(&mut ws).await else {
        panic!("expected sync:tasks");
    };
    assert!(tasks.is_empty());
}
