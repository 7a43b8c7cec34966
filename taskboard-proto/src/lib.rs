//! Shared data model and wire protocol for `Taskboard`.

pub mod column;
pub mod document;
pub mod ids;
pub mod suggest;
pub mod sync;
pub mod task;
