// src/engine/mod.rs

//! Watch-mode orchestration.
//!
//! The pure debounce state machine lives in [`crate::watch::debounce`]; the
//! async shell that feeds it events, sleeps until its deadlines and runs the
//! scheduler is [`session::WatchSession`]. Completed builds are announced to
//! [`notifier::ReloadNotifier`]s.

use std::sync::Arc;

use crate::dag::RunReport;
use crate::watch::ChangeEvent;

pub mod notifier;
pub mod session;

pub use notifier::{BroadcastNotifier, LogNotifier, ReloadNotifier};
pub use session::WatchSession;

/// Events flowing into a watch session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A watched file changed.
    Change(ChangeEvent),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

/// Announced after every run that executed at least one task.
#[derive(Debug, Clone)]
pub struct BuildCompleted {
    pub run_id: u64,
    /// True when no task failed or was skipped.
    pub success: bool,
    /// Outputs rewritten with new content, in execution order.
    pub changed_outputs: Vec<String>,
    pub report: Arc<RunReport>,
}

impl From<RunReport> for BuildCompleted {
    fn from(report: RunReport) -> Self {
        Self {
            run_id: report.run_id,
            success: report.success(),
            changed_outputs: report.changed_outputs.clone(),
            report: Arc::new(report),
        }
    }
}
