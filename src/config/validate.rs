// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, ConfigSection, RawConfigFile, RawTaskConfig};
use crate::dag::{EachOutput, Task, TaskGraph, TaskOutput};
use crate::errors::{PipelineError, Result};
use crate::transform::{ProviderKind, TransformOptions};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_tasks(&raw)?;
        validate_global_config(&raw.config)?;

        let tasks = raw
            .task
            .iter()
            .map(build_task)
            .collect::<Result<Vec<_>>>()?;

        validate_unique_outputs(&tasks)?;
        validate_dag(&tasks)?;

        Ok(ConfigFile::new_unchecked(raw.config, tasks))
    }
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipelineError::ConfigError(
            "config must contain at least one [[task]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigSection) -> Result<()> {
    if cfg.debounce_ms == 0 {
        return Err(PipelineError::ConfigError(
            "[config].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    for pattern in cfg.watch.iter().chain(cfg.exclude.iter()) {
        Glob::new(pattern).map_err(|e| {
            PipelineError::ConfigError(format!("invalid glob pattern {pattern:?} in [config]: {e}"))
        })?;
    }

    Ok(())
}

fn build_task(raw: &RawTaskConfig) -> Result<Task> {
    let kind: ProviderKind = raw.provider.parse().map_err(|e: String| {
        PipelineError::ConfigError(format!("task '{}': {e}", raw.name))
    })?;

    let in_task = |e: PipelineError| match e {
        PipelineError::ConfigError(msg) => {
            PipelineError::ConfigError(format!("task '{}': {msg}", raw.name))
        }
        other => other,
    };

    let options = TransformOptions::from_table(kind, raw.options.clone()).map_err(in_task)?;

    let output = match (&raw.output, &raw.each) {
        (Some(path), None) => TaskOutput::file(path).map_err(in_task)?,
        (None, Some(each)) => {
            TaskOutput::Each(EachOutput::new(&each.base, &each.dest, &each.ext).map_err(in_task)?)
        }
        _ => {
            return Err(PipelineError::ConfigError(format!(
                "task '{}' must declare exactly one of `output` or `each`",
                raw.name
            )));
        }
    };

    Task::with_output(raw.name.clone(), &raw.inputs, output, options)
}

/// Two tasks writing the same file would make edge inference ambiguous.
fn validate_unique_outputs(tasks: &[Task]) -> Result<()> {
    for (i, first) in tasks.iter().enumerate() {
        for second in &tasks[i + 1..] {
            // A repeated name is reported as such by the graph check.
            if first.name() == second.name() {
                continue;
            }
            if let Some(contested) = output_clash(first.output(), second.output()) {
                return Err(PipelineError::ConfigError(format!(
                    "tasks '{}' and '{}' both declare output '{contested}'",
                    first.name(),
                    second.name(),
                )));
            }
        }
    }
    Ok(())
}

/// The path (or pattern) two outputs could both write, if any.
fn output_clash(a: &TaskOutput, b: &TaskOutput) -> Option<String> {
    match (a, b) {
        (TaskOutput::File(x), TaskOutput::File(y)) => (x == y).then(|| x.clone()),
        (TaskOutput::File(path), TaskOutput::Each(each))
        | (TaskOutput::Each(each), TaskOutput::File(path)) => {
            each.covers(path).then(|| path.clone())
        }
        (TaskOutput::Each(x), TaskOutput::Each(y)) => {
            (x.dest() == y.dest() && x.ext() == y.ext()).then(|| x.as_glob())
        }
    }
}

/// Surface duplicate names and cycles at load time, before anything runs.
fn validate_dag(tasks: &[Task]) -> Result<()> {
    let mut graph = TaskGraph::new();
    for task in tasks {
        graph.add_task(task.clone())?;
    }
    graph.build()?;
    Ok(())
}
