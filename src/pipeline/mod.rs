//! Monitoring pipeline.
//!
//! - `normalize`: raw rows to canonical items
//! - `snapshot`: deduplicated, hashed course snapshots
//! - `diff`: changes between two snapshots of a course
//! - `monitor`: per-run orchestration over all courses

pub mod diff;
pub mod monitor;
pub mod normalize;
pub mod snapshot;

pub use diff::{DiffCalculator, diff_snapshots};
pub use monitor::{CourseOutcome, CourseReport, Monitor, MonitorOptions, RunSummary, report_lines};
pub use normalize::Normalizer;
pub use snapshot::{SnapshotBuilder, content_hash};
