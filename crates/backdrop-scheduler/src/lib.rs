//! `backdrop-scheduler`: decides when a new background image is due and
//! runs generation cycles against a persisted state record.
//!
//! # Decision table
//!
//! | Condition                         | Due | Reason               |
//! |-----------------------------------|-----|----------------------|
//! | no image in the slot              | yes | `NoArtifact`         |
//! | no last-generation timestamp      | yes | `NoState`            |
//! | elapsed >= interval               | yes | `IntervalElapsed`    |
//! | otherwise                         | no  | `IntervalNotElapsed` |
//!
//! An unreadable state record is treated as "no timestamp" (fail open).

pub mod engine;
pub mod lock;
pub mod schedule;
pub mod state;
pub mod status;
pub mod types;

pub use engine::{CycleOutcome, RunController};
pub use lock::RunLock;
pub use schedule::{decide, next_due_at};
pub use state::{JsonStateStore, StateStore};
pub use status::{StatusReport, StatusReporter};
pub use types::{DecisionReason, GenerationDecision, GenerationState};
