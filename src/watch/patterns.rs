// src/watch/patterns.rs

use std::collections::HashSet;
use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::model::ConfigSection;
use crate::dag::ExecutionPlan;

/// Compiled include/exclude globs deciding which changed paths matter.
///
/// Declared task outputs (including what per-input mappings write) never
/// pass, so writing an artifact cannot trigger another build.
#[derive(Clone)]
pub struct WatchFilter {
    include: GlobSet,
    exclude: GlobSet,
    outputs: HashSet<String>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

impl WatchFilter {
    pub fn new<I, S>(include: &[String], exclude: &[String], outputs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self {
            include: build_globset(include).context("building watch globset")?,
            exclude: build_globset(exclude).context("building exclude globset")?,
            outputs: outputs.into_iter().map(Into::into).collect(),
        })
    }

    /// `[config].watch` if given, otherwise every task input pattern.
    pub fn from_plan(cfg: &ConfigSection, plan: &ExecutionPlan) -> Result<Self> {
        let include = if cfg.watch.is_empty() {
            plan.input_patterns()
        } else {
            cfg.watch.clone()
        };
        let mut exclude = cfg.exclude.clone();
        exclude.extend(plan.output_globs());
        Self::new(&include, &exclude, plan.outputs())
    }

    /// Whether a change to `rel_path` (relative to the project root, forward
    /// slashes) should be fed to the debouncer.
    pub fn matches(&self, rel_path: &str) -> bool {
        if self.outputs.contains(rel_path) {
            return false;
        }
        self.include.is_match(rel_path) && !self.exclude.is_match(rel_path)
    }
}

/// Build a GlobSet from simple string patterns. `*` does not cross `/`.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
