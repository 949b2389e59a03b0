#![forbid(unsafe_code)]

//! Core domain model and business logic for the weight planner.
//!
//! This crate provides:
//! - Domain types (log entries, goals, projections, correction segments)
//! - Maintenance calorie estimation
//! - Goal projection
//! - Drift detection and correction segments
//! - Persistence (JSONL log and segments, goal state, CSV import/export)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod history;
pub mod maintenance;
pub mod projection;
pub mod correction;
pub mod coordinator;
pub mod timeline;
pub mod store;
pub mod wal;
pub mod state;
pub mod csv_io;

// Re-export commonly used types
pub use error::{Error, Result, Shortfall, ShortfallKind};
pub use types::*;
pub use config::Config;
pub use maintenance::{estimate_maintenance, MaintenanceEstimate, MaintenanceEstimator};
pub use projection::{project, GoalProjector};
pub use correction::{maybe_generate_correction_segment, CorrectionGenerator, Decision, HoldReason};
pub use coordinator::{CorrectionCoordinator, CorrectionWorker, Evaluation, StoreChange};
pub use timeline::GoalTimeline;
pub use store::{GoalStore, SegmentStore, WeightLogStore};
pub use wal::{JsonlLogStore, JsonlSegmentStore};
pub use state::JsonGoalStore;
