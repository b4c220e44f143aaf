//! Shared data model for the studio pipeline tracker
//!
//! This crate holds everything the engine and any frontend need to agree on:
//! roles, task identity, the task and project structures, the static phase
//! template registry, and round expansion. All types here are plain data —
//! the materialization/mutation/reconciliation logic lives in the
//! `studio-tracker` crate.

pub mod phases;
pub mod project;
pub mod task;

pub use phases::{
    generated_tasks, expand_rounds, parse_round_title, static_tasks, Phase,
};
pub use project::{Project, ProjectStatus, RoundCounts, TaskGroup};
pub use task::{
    normalize_due, today_stamp, ChecklistItem, IdParseError, Role, Task, TaskId, TaskLink,
    DATE_SENTINEL,
};
