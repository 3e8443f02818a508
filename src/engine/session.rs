// src/engine/session.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::dag::{RunReport, Scheduler};
use crate::types::RebuildMode;
use crate::watch::{ChangeBatch, Debouncer, WatchState};

use super::{BuildCompleted, ReloadNotifier, SessionEvent};

/// Async shell around the [`Debouncer`]: reads [`SessionEvent`]s, sleeps until
/// the debounce deadline, runs the scheduler and announces the result.
///
/// Events keep being consumed while a build is running; they are queued by
/// the debouncer and produce exactly one follow-up build. On shutdown an
/// in-flight build is allowed to finish and emit before the session ends.
pub struct WatchSession {
    scheduler: Scheduler,
    debouncer: Debouncer,
    mode: RebuildMode,
    use_hash: bool,
    notifiers: Vec<Arc<dyn ReloadNotifier>>,
    event_rx: mpsc::Receiver<SessionEvent>,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("debouncer", &self.debouncer)
            .field("mode", &self.mode)
            .field("use_hash", &self.use_hash)
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    pub fn new(
        scheduler: Scheduler,
        debounce: Duration,
        mode: RebuildMode,
        event_rx: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self {
            scheduler,
            debouncer: Debouncer::new(debounce),
            mode,
            use_hash: false,
            notifiers: Vec::new(),
            event_rx,
        }
    }

    /// Skip rebuilds for changes whose content hashes the same as when it was
    /// last read.
    pub fn with_use_hash(mut self, use_hash: bool) -> Self {
        self.use_hash = use_hash;
        self
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn ReloadNotifier>) {
        self.notifiers.push(notifier);
    }

    /// Main event loop. Returns the scheduler once the session has stopped
    /// (shutdown requested or the event channel closed).
    pub async fn run(self) -> Scheduler {
        let WatchSession {
            mut scheduler,
            mut debouncer,
            mode,
            use_hash,
            notifiers,
            mut event_rx,
        } = self;
        let mut rx_open = true;

        info!(window = ?debouncer.window(), ?mode, "watch session started");

        while debouncer.state() != WatchState::Stopped {
            let deadline = debouncer.deadline();

            tokio::select! {
                event = event_rx.recv(), if rx_open => {
                    rx_open = apply_event(&mut debouncer, event);
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let Some(batch) = debouncer.poll(Instant::now()) else {
                        continue;
                    };

                    let build = run_batch(&mut scheduler, mode, use_hash, batch);
                    tokio::pin!(build);

                    // Keep feeding the debouncer while the build runs.
                    let report = loop {
                        tokio::select! {
                            report = &mut build => break report,
                            event = event_rx.recv(), if rx_open => {
                                rx_open = apply_event(&mut debouncer, event);
                            }
                        }
                    };

                    emit(&notifiers, report);
                    debouncer.finish_run(Instant::now());
                }

                else => break,
            }
        }

        info!("watch session stopped");
        scheduler
    }
}

/// Feed one received event into the debouncer. Returns `false` once the
/// channel is closed.
fn apply_event(debouncer: &mut Debouncer, event: Option<SessionEvent>) -> bool {
    match event {
        Some(SessionEvent::Change(change)) => {
            debug!(path = %change.path, kind = ?change.kind, state = ?debouncer.state(), "change event");
            debouncer.on_change(change, Instant::now());
            true
        }
        Some(SessionEvent::ShutdownRequested) => {
            info!("shutdown requested");
            debouncer.request_stop();
            true
        }
        None => {
            info!("session event channel closed; stopping");
            debouncer.request_stop();
            false
        }
    }
}

/// Run the build for one debounced batch.
///
/// Every batch yields a report, possibly with no tasks in it: a batch whose
/// changes were all content-identical, or touched no task input, still ends
/// in one (successful, empty) announcement.
async fn run_batch(
    scheduler: &mut Scheduler,
    mode: RebuildMode,
    use_hash: bool,
    batch: ChangeBatch,
) -> RunReport {
    let mut changed = batch.paths();
    if use_hash {
        changed = scheduler.filter_unchanged(&changed);
        if changed.is_empty() {
            debug!(batch = batch.len(), "every change was content-identical; not rebuilding");
            return scheduler.run_subset(&changed).await;
        }
    }

    info!(changes = changed.len(), ?mode, "rebuilding after changes");
    match mode {
        RebuildMode::Full => scheduler.run_full().await,
        RebuildMode::Incremental => scheduler.run_subset(&changed).await,
    }
}

fn emit(notifiers: &[Arc<dyn ReloadNotifier>], report: RunReport) {
    let event = BuildCompleted::from(report);
    for notifier in notifiers {
        notifier.notify(&event);
    }
}
