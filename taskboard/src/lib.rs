//! Taskboard client library.
//!
//! Board view-state, drag-and-drop reconciliation, and the collaborators a
//! board talks to: the document store and the suggestion service.

pub mod board;
pub mod config;
pub mod controller;
pub mod forms;
pub mod identity;
pub mod notify;
pub mod render;
pub mod store;
pub mod suggest;
