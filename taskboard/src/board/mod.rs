//! Board view-state and drag-and-drop reconciliation.
//!
//! [`reconcile`] turns a drag-end event into a new task list and an optional
//! column write; [`state`] owns the ephemeral view-state the board renders
//! from; [`filter`] holds the search and priority filters.

pub mod filter;
pub mod reconcile;
pub mod state;

pub use filter::{PriorityFilter, TaskFilter};
pub use reconcile::{ColumnWrite, DropKind, DropOutcome, ReconcileError, reconcile_drop};
pub use state::{BoardAction, BoardState};
