//! mirrorsync sync engine
//!
//! This module provides one-way mirroring of a source tree onto a replica
//! tree, including:
//! - Change detection by fingerprint (size, modification time) and content hash
//! - A two-phase tree walk: propagate new/changed entries, then prune extras
//! - Activity reporting for a per-entry audit trail
//! - Periodic scheduling of synchronization passes

pub mod detector;
pub mod engine;
pub mod reporter;
pub mod scheduler;
pub mod summary;

// Re-export main types
pub use detector::{ChangeDetector, ContentHash, Staleness};
pub use engine::TreeSynchronizer;
pub use reporter::{Activity, ActivityLevel, ActivityReporter, RecordingReporter, TracingReporter};
pub use scheduler::{FailurePolicy, SchedulerConfig, SchedulerHandle, SyncScheduler};
pub use summary::PassSummary;
