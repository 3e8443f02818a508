// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::SessionEvent;
use crate::errors::{PipelineError, Result};
use crate::watch::debounce::{ChangeEvent, ChangeKind};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchFilter;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .finish()
    }
}

/// Map a notify event kind to the change kinds the pipeline cares about.
/// Metadata-only and access events are dropped.
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

/// Watch `root` recursively and forward every change that passes `filter`
/// as [`SessionEvent::Change`] into `session_tx`.
///
/// Fails with [`PipelineError::WatchSetup`] when `root` is not an existing
/// directory or the platform watcher cannot be installed; nothing is sent in
/// that case.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    filter: WatchFilter,
    session_tx: mpsc::Sender<SessionEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    if !root.is_dir() {
        return Err(PipelineError::WatchSetup {
            path: root,
            reason: "not an existing directory".to_string(),
        });
    }
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event_tx.send(event).is_err() {
                    debug!("watch event receiver dropped");
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .map_err(|e| PipelineError::WatchSetup {
        path: root.clone(),
        reason: e.to_string(),
    })?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| PipelineError::WatchSetup {
            path: root.clone(),
            reason: e.to_string(),
        })?;

    info!(root = ?root, "file watcher started");

    let async_root = root.clone();
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!(?event, "received notify event");

            let Some(kind) = change_kind(&event.kind) else {
                continue;
            };

            for path in event.paths {
                if kind != ChangeKind::Deleted && path.is_dir() {
                    continue;
                }
                let Some(rel) = relative_str(&async_root, &path) else {
                    warn!(?path, root = ?async_root, "could not relativize event path");
                    continue;
                };
                if !filter.matches(&rel) {
                    continue;
                }

                debug!(path = %rel, ?kind, "forwarding change");
                let change = SessionEvent::Change(ChangeEvent::new(rel, kind));
                if session_tx.send(change).await.is_err() {
                    debug!("watch session gone; stopping event forwarding");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        root,
    })
}
