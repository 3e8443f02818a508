// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Structural errors (`DuplicateTask`, `CyclicDependency`, `ConfigError`)
//! are fatal before any run starts. `DanglingInput` and `Transform` are
//! scoped to one task and end up inside a [`crate::dag::RunReport`];
//! dependents of such a task are skipped with an [`UpstreamFailure`].

use std::path::PathBuf;

use thiserror::Error;

use crate::dag::TaskName;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("duplicate task name '{0}'")]
    DuplicateTask(TaskName),

    #[error("cycle detected in task graph involving tasks: {}", .members.join(", "))]
    CyclicDependency { members: Vec<TaskName> },

    #[error("task '{task}': input '{input}' matches neither a source file nor any task output")]
    DanglingInput { task: TaskName, input: String },

    #[error("task '{task}' failed: {source:#}")]
    Transform {
        task: TaskName,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    UpstreamFailure(#[from] UpstreamFailure),

    #[error("cannot watch {path:?}: {reason}")]
    WatchSetup { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Reason attached to a task that was not invoked because a task it
/// (transitively) consumes from failed in the same run.
///
/// Always names the task that actually failed, not the intermediate
/// skipped one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skipped: upstream task '{0}' failed")]
pub struct UpstreamFailure(pub TaskName);

impl UpstreamFailure {
    pub fn failed_task(&self) -> &str {
        &self.0
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
