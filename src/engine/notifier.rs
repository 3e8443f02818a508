// src/engine/notifier.rs

use std::fmt::Debug;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::BuildCompleted;

/// Receives [`BuildCompleted`] events, typically to tell a browser to reload.
///
/// Implementations must not block; they run on the watch session's task.
pub trait ReloadNotifier: Send + Sync + Debug {
    fn notify(&self, event: &BuildCompleted);
}

/// Logs a one-line summary of every build.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl ReloadNotifier for LogNotifier {
    fn notify(&self, event: &BuildCompleted) {
        if event.success {
            info!(
                run_id = event.run_id,
                changed = ?event.changed_outputs,
                "build completed"
            );
        } else {
            warn!(
                run_id = event.run_id,
                failed = ?event.report.failed_tasks(),
                skipped = ?event.report.skipped_tasks(),
                changed = ?event.changed_outputs,
                "build completed with failures"
            );
        }
    }
}

/// Fans events out over a tokio broadcast channel so any transport
/// (websocket, SSE, test harness) can subscribe.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<BuildCompleted>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BuildCompleted> {
        self.tx.subscribe()
    }
}

impl ReloadNotifier for BroadcastNotifier {
    fn notify(&self, event: &BuildCompleted) {
        if self.tx.send(event.clone()).is_err() {
            debug!(run_id = event.run_id, "no reload subscribers");
        }
    }
}
