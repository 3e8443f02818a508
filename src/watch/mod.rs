// src/watch/mod.rs

//! File watching and change debouncing.
//!
//! This module is responsible for:
//! - Compiling `watch` / `exclude` glob patterns (plus the declared outputs,
//!   which are always ignored) into a [`WatchFilter`].
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//! - The pure [`Debouncer`] state machine that groups bursts of changes into
//!   one rebuild.
//!
//! It does **not** run anything; the engine's watch session drives the
//! scheduler with the batches handed out here.

pub mod debounce;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use debounce::{ChangeBatch, ChangeEvent, ChangeKind, Debouncer, WatchState};
pub use patterns::WatchFilter;
pub use watcher::{WatcherHandle, spawn_watcher};
