//! Core engine for the studio pipeline tracker
//!
//! Everything revolves around one query — [`materialize::materialize`], the
//! computation of the visible, ordered task list per phase — and the
//! operations that keep derived state consistent with it: progress
//! aggregation, the snapshot mutation catalogue, the two-way spreadsheet
//! reconciler, SQLite persistence with a redundant meta bag, and the
//! local-first merge/refresh policy.

pub mod database;
pub mod folders;
pub mod materialize;
pub mod mutations;
pub mod progress;
pub mod sync;
pub mod workbook;
