//! Syncboard realtime sync server library.
//!
//! Exposes the sync core for use in tests and embedding: the task store
//! adapter, the session and room registries, the broadcast router, and the
//! WebSocket transport. The server holds no long-lived task state; the
//! store is the single source of truth and every snapshot or post-mutation
//! event re-derives its rows from it.

pub mod config;
pub mod mapper;
pub mod rooms;
pub mod router;
pub mod server;
pub mod session;
pub mod store;
