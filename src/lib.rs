//! # Tami Core
//!
//! Ordered-collection engine and domain models for Tami voice-driven task
//! management.
//!
//! This crate provides the board, list and task types, the ranked reordering
//! and cross-list move engine, and the ordered-record store contract without
//! any dependency on specific UI implementations or hosted backends.

pub mod board;
pub mod calendar;
pub mod domain;
pub mod error;
pub mod extract;
pub mod store;

// Re-export commonly used types
pub use board::{Board, SeedList, WorkspaceConfig};
pub use domain::{
    list::{List, ListId},
    task::{Priority, Subtask, SubtaskId, Task, TaskId, TaskStatus},
};
pub use error::{Result, TamiError};
pub use extract::{parse_extraction, Extraction, Intent, TaskDraft};
pub use store::ItemStore;
