//! Activity reporting for synchronization passes.

use std::sync::{Mutex, PoisonError};
use tracing::{error, info, warn};

/// Receives human-readable events produced during a pass.
///
/// Reporting is fire-and-forget: implementations must not fail the caller.
pub trait ActivityReporter: Send + Sync {
    /// Normal progress, one event per entry handled.
    fn info(&self, message: &str);

    /// Something unusual that did not stop the pass.
    fn warning(&self, message: &str);

    /// A failure, optionally with the underlying fault.
    fn error(&self, message: &str, fault: Option<&(dyn std::error::Error + 'static)>);
}

/// Reporter that forwards activity to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ActivityReporter for TracingReporter {
    fn info(&self, message: &str) {
        info!(target: "mirrorsync::activity", "{}", message);
    }

    fn warning(&self, message: &str) {
        warn!(target: "mirrorsync::activity", "{}", message);
    }

    fn error(&self, message: &str, fault: Option<&(dyn std::error::Error + 'static)>) {
        match fault {
            Some(fault) => error!(target: "mirrorsync::activity", error = %fault, "{}", message),
            None => error!(target: "mirrorsync::activity", "{}", message),
        }
    }
}

/// Severity of a recorded activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
}

/// A single recorded activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub level: ActivityLevel,
    pub message: String,
    /// Display form of the fault attached to an error, if any.
    pub fault: Option<String>,
}

/// Reporter that keeps every activity in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    activities: Mutex<Vec<Activity>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All activities recorded so far.
    pub fn activities(&self) -> Vec<Activity> {
        self.activities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages recorded at `level`.
    pub fn messages(&self, level: ActivityLevel) -> Vec<String> {
        self.activities()
            .into_iter()
            .filter(|a| a.level == level)
            .map(|a| a.message)
            .collect()
    }

    /// Whether any message at any level contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.activities()
            .iter()
            .any(|a| a.message.contains(needle))
    }

    fn record(&self, level: ActivityLevel, message: &str, fault: Option<String>) {
        self.activities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Activity {
                level,
                message: message.to_string(),
                fault,
            });
    }
}

impl ActivityReporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.record(ActivityLevel::Info, message, None);
    }

    fn warning(&self, message: &str) {
        self.record(ActivityLevel::Warning, message, None);
    }

    fn error(&self, message: &str, fault: Option<&(dyn std::error::Error + 'static)>) {
        self.record(ActivityLevel::Error, message, fault.map(|f| f.to_string()));
    }
}
