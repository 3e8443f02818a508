// src/dag/report.rs

use std::fmt::Write as _;
use std::time::Duration;

use crate::dag::task::TaskName;
use crate::errors::{PipelineError, UpstreamFailure};
use crate::types::RunKind;

/// Outcome of one task within one run.
#[derive(Debug)]
pub enum TaskStatus {
    /// The provider succeeded and every output is in the cache. `written`
    /// lists the outputs whose content differed from what was on disk.
    Succeeded {
        outputs: Vec<String>,
        written: Vec<String>,
    },
    Failed(PipelineError),
    Skipped(UpstreamFailure),
}

impl TaskStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TaskStatus::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TaskStatus::Skipped(_))
    }

    fn label(&self) -> &'static str {
        match self {
            TaskStatus::Succeeded { .. } => "ok",
            TaskStatus::Failed(_) => "FAILED",
            TaskStatus::Skipped(_) => "skipped",
        }
    }
}

#[derive(Debug)]
pub struct TaskReport {
    pub name: TaskName,
    pub status: TaskStatus,
    pub duration: Duration,
}

/// Everything that happened in one scheduler run, tasks in execution order.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: u64,
    pub kind: RunKind,
    pub tasks: Vec<TaskReport>,
    /// Outputs whose content changed on disk during this run.
    pub changed_outputs: Vec<String>,
}

impl RunReport {
    pub(crate) fn new(run_id: u64, kind: RunKind) -> Self {
        Self {
            run_id,
            kind,
            tasks: Vec::new(),
            changed_outputs: Vec::new(),
        }
    }

    /// True when no task in the run failed or was skipped.
    pub fn success(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_success())
    }

    /// Whether any task ran at all.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn status_of(&self, task: &str) -> Option<&TaskStatus> {
        self.tasks.iter().find(|t| t.name == task).map(|t| &t.status)
    }

    /// Names of tasks that reached their provider (succeeded or failed), in
    /// execution order.
    pub fn executed(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| !t.status.is_skipped())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn failed_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status.is_failure())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn skipped_tasks(&self) -> Vec<&str> {
        self.tasks
            .iter()
            .filter(|t| t.status.is_skipped())
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.tasks.iter().map(|t| t.duration).sum()
    }

    /// Human-readable summary, one line per task.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let width = self.tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);

        for task in &self.tasks {
            let _ = write!(
                out,
                "  {:<7} {:<width$}  {:>6}ms",
                task.status.label(),
                task.name,
                task.duration.as_millis(),
            );
            match &task.status {
                TaskStatus::Succeeded { outputs, written } => {
                    let note = if written.is_empty() { " (unchanged)" } else { "" };
                    let _ = write!(out, "  -> {}{note}", outputs.join(", "));
                }
                TaskStatus::Failed(err) => {
                    let _ = write!(out, "  {err}");
                }
                TaskStatus::Skipped(reason) => {
                    let _ = write!(out, "  {reason}");
                }
            }
            out.push('\n');
        }

        let failed = self.failed_tasks().len();
        let skipped = self.skipped_tasks().len();
        let _ = writeln!(
            out,
            "run #{} ({:?}): {} task(s), {} failed, {} skipped, {} output(s) changed in {}ms",
            self.run_id,
            self.kind,
            self.tasks.len(),
            failed,
            skipped,
            self.changed_outputs.len(),
            self.total_duration().as_millis(),
        );
        out
    }
}
