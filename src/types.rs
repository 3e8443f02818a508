// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// What a watch session re-runs after a debounced batch of changes.
///
/// - `Incremental`: only the tasks reachable from the changed inputs
///   (default behaviour).
/// - `Full`: the whole pipeline on any change, matching older setups that
///   rebuilt everything from a single watch trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildMode {
    #[default]
    Incremental,
    Full,
}

impl FromStr for RebuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incremental" => Ok(RebuildMode::Incremental),
            "full" => Ok(RebuildMode::Full),
            other => Err(format!(
                "invalid rebuild mode: {other} (expected \"incremental\" or \"full\")"
            )),
        }
    }
}

/// Which entry point produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Every task in the plan.
    Full,
    /// The forward closure of tasks affected by a set of changed paths.
    Incremental,
}
