//! `Taskboard` store server library.
//!
//! Exposes the document store, its WebSocket/HTTP server and the AI
//! suggestion proxy for use in tests and embedding. The server keeps
//! per-owner task and column collections, pushes full snapshots to
//! subscribers on every change, and validates everything it is sent.

pub mod config;
pub mod documents;
pub mod persist;
pub mod server;
pub mod suggest;
