//! WebSocket transport: connection lifecycle and frame plumbing.
//!
//! Accepts WebSocket connections on `/ws`, registers a session for each,
//! and shuttles JSON frames between the socket and the
//! [`TaskRouter`]. Each connection gets a reader task (decode intent →
//! route) and a writer task (drain the session's outbound channel → encode
//! frame); whichever finishes first tears the other down, and the session
//! is unregistered on the way out.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use syncboard_proto::codec;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::router::TaskRouter;

/// Handles an upgraded WebSocket connection for a single session.
///
/// The connection lifecycle:
/// 1. Register a fresh session with the router (no identity yet).
/// 2. Spawn a writer task draining the session's outbound events.
/// 3. Route inbound text frames until the peer disconnects.
/// 4. Unregister the session, leaving its room.
pub async fn handle_socket(socket: WebSocket, router: Arc<TaskRouter>) {
    let session_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    router.connect(session_id, tx).await;
    tracing::info!(session_id = %session_id, "connection established");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Writer task: serialize outbound events onto the socket.
    let writer_session = session_id;
    let mut write_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match codec::encode_server(&event) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text.into())).await.is_err() {
                        tracing::warn!(session_id = %writer_session, "WebSocket write failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(session_id = %writer_session, error = %e, "event encoding failed");
                }
            }
        }
    });

    // Reader task: decode intents and hand them to the router.
    let reader_router = Arc::clone(&router);
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => match codec::decode_client(text.as_str()) {
                    Ok(event) => reader_router.handle(session_id, event).await,
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "discarding malformed frame"
                        );
                    }
                },
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore binary, ping, pong frames.
                }
            }
        }
    });

    // Wait for either task to finish, then abort the other.
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
        }
    }

    router.disconnect(session_id).await;
    tracing::info!(session_id = %session_id, "session disconnected and unregistered");
}

/// Starts the server with a pre-built [`TaskRouter`], returning the bound
/// address and a join handle.
///
/// This is the primary entry point used by both `main.rs` and test code.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    router: Arc<TaskRouter>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(router);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

/// axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(router): axum::extract::State<Arc<TaskRouter>>,
) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, router))
}
