// src/watch/debounce.rs

//! Trailing-edge debounce as a pure state machine.
//!
//! ```text
//! Idle        --change-->        Pending     (window opens)
//! Pending     --change-->        Debouncing  (deadline reset)
//! Debouncing  --change-->        Debouncing  (deadline reset)
//! Pending | Debouncing --poll after deadline--> Running
//! Running     --change-->        Running     (queued)
//! Running     --finish_run-->    Idle, or Pending if changes were queued
//! any         --request_stop-->  Stopped     (Running stops at finish_run)
//! ```
//!
//! No clock is read here: every transition takes the current instant, so the
//! machine can be driven from tests with arbitrary timestamps.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A filesystem change for a project-relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn modified(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    pub fn created(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Created)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(path, ChangeKind::Deleted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Nothing pending.
    Idle,
    /// One change seen; the window is open.
    Pending,
    /// Further changes arrived; each one pushed the deadline back.
    Debouncing,
    /// A batch was handed out and its build has not finished.
    Running,
    /// Terminal.
    Stopped,
}

/// The set of changes that triggers one build. A path changed several times
/// keeps its latest kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    changes: BTreeMap<String, ChangeKind>,
}

impl ChangeBatch {
    pub fn paths(&self) -> BTreeSet<String> {
        self.changes.keys().cloned().collect()
    }

    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        self.changes.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    state: WatchState,
    /// Changes collected while Pending/Debouncing, or queued while Running.
    pending: ChangeBatch,
    deadline: Option<Instant>,
    stop_after_run: bool,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: WatchState::Idle,
            pending: ChangeBatch::default(),
            deadline: None,
            stop_after_run: false,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// When the current window closes, if one is open.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Number of distinct paths waiting for the next build.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn on_change(&mut self, event: ChangeEvent, now: Instant) {
        match self.state {
            WatchState::Stopped => return,
            WatchState::Idle => {
                self.state = WatchState::Pending;
                self.deadline = Some(now + self.window);
            }
            WatchState::Pending | WatchState::Debouncing => {
                self.state = WatchState::Debouncing;
                self.deadline = Some(now + self.window);
            }
            WatchState::Running => {
                debug!(path = %event.path, "change during build; queued");
            }
        }
        self.pending.changes.insert(event.path, event.kind);
    }

    /// Hand out the collected batch once the window has elapsed, moving to
    /// `Running`. Returns `None` while the window is still open or when
    /// there is nothing to hand out.
    pub fn poll(&mut self, now: Instant) -> Option<ChangeBatch> {
        if !matches!(self.state, WatchState::Pending | WatchState::Debouncing) {
            return None;
        }
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }

        self.state = WatchState::Running;
        self.deadline = None;
        Some(std::mem::take(&mut self.pending))
    }

    /// The build started by the last `poll` has finished (and its event was
    /// emitted). Changes queued meanwhile open a fresh window.
    pub fn finish_run(&mut self, now: Instant) {
        if self.state != WatchState::Running {
            return;
        }

        if self.stop_after_run {
            self.stop();
        } else if self.pending.is_empty() {
            self.state = WatchState::Idle;
        } else {
            self.state = WatchState::Pending;
            self.deadline = Some(now + self.window);
        }
    }

    /// Stop watching. Pending changes are dropped; a build in progress is
    /// allowed to finish first.
    pub fn request_stop(&mut self) {
        match self.state {
            WatchState::Running => self.stop_after_run = true,
            WatchState::Stopped => {}
            _ => self.stop(),
        }
    }

    fn stop(&mut self) {
        self.state = WatchState::Stopped;
        self.deadline = None;
        self.pending = ChangeBatch::default();
    }
}
