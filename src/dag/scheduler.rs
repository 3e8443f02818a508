// src/dag/scheduler.rs

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::dag::cache::{ArtifactCache, hash_bytes};
use crate::dag::plan::ExecutionPlan;
use crate::dag::report::{RunReport, TaskReport, TaskStatus};
use crate::dag::task::{InputPattern, Task, TaskName, TaskOutput};
use crate::errors::{PipelineError, Result, UpstreamFailure};
use crate::fs::{FileSystem, normalize_rel};
use crate::transform::{Artifact, ProviderSet};
use crate::types::RunKind;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunState {
    Succeeded,
    Failed,
    /// Carries the name of the task whose failure caused the skip.
    Skipped(TaskName),
}

/// Executes an [`ExecutionPlan`] against a file system.
///
/// The scheduler owns everything a run touches: the read-only plan, the
/// provider registry, the artifact cache and the file system handle. Several
/// schedulers can coexist (one per pipeline); none of them share state.
///
/// Tasks run one at a time in plan order. A task whose producer failed or was
/// skipped in the same run is itself skipped; unrelated tasks keep going.
#[derive(Debug)]
pub struct Scheduler {
    plan: Arc<ExecutionPlan>,
    providers: ProviderSet,
    fs: Arc<dyn FileSystem>,
    /// Directory that task paths are relative to.
    root: PathBuf,
    cache: ArtifactCache,
    /// Monotonically increasing run ID.
    run_counter: u64,
}

impl Scheduler {
    pub fn new(
        plan: ExecutionPlan,
        providers: ProviderSet,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            plan: Arc::new(plan),
            providers,
            fs,
            root: root.into(),
            cache: ArtifactCache::new(),
            run_counter: 0,
        }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run every task in plan order.
    pub async fn run_full(&mut self) -> RunReport {
        let order = self.plan.order_indices().to_vec();
        self.execute(order, RunKind::Full).await
    }

    /// Run only the tasks affected by `changed` (project-relative paths):
    /// tasks with an input selecting one of them, and everything downstream.
    ///
    /// Tasks outside that closure are not invoked; their cached outputs feed
    /// the tasks that do run. A set that affects nothing yields an empty
    /// report.
    pub async fn run_subset(&mut self, changed: &BTreeSet<String>) -> RunReport {
        let changed: BTreeSet<String> = changed.iter().map(|p| normalize_rel(p)).collect();

        for path in &changed {
            if !self.fs.exists(&self.root.join(path)) {
                self.cache.forget_source(path);
            }
        }

        let affected = self.plan.affected_indices(&changed);
        if affected.is_empty() {
            debug!(changed = ?changed, "no task consumes the changed paths");
        }
        self.execute(affected, RunKind::Incremental).await
    }

    /// Drop paths whose current content hashes the same as when a task last
    /// read them. Paths never read, or no longer readable, are kept.
    pub fn filter_unchanged(&self, changed: &BTreeSet<String>) -> BTreeSet<String> {
        changed
            .iter()
            .filter(|path| {
                let path = normalize_rel(path);
                let Some(previous) = self.cache.source_hash(&path) else {
                    return true;
                };
                match self.fs.read(&self.root.join(&path)) {
                    Ok(content) => {
                        let same = hash_bytes(&content) == previous;
                        if same {
                            debug!(path = %path, "content unchanged; ignoring change event");
                        }
                        !same
                    }
                    Err(_) => true,
                }
            })
            .cloned()
            .collect()
    }

    async fn execute(&mut self, indices: Vec<usize>, kind: RunKind) -> RunReport {
        self.run_counter += 1;
        let run_id = self.run_counter;
        let plan = Arc::clone(&self.plan);
        let mut report = RunReport::new(run_id, kind);
        let mut states: HashMap<usize, RunState> = HashMap::new();

        info!(run_id, ?kind, tasks = indices.len(), "starting run");

        for idx in indices {
            let task = plan.task_at(idx);

            if let Some(origin) = upstream_failure(&plan, idx, &states) {
                warn!(
                    run_id,
                    task = %task.name(),
                    upstream = %origin,
                    "skipping task: upstream failure"
                );
                states.insert(idx, RunState::Skipped(origin.clone()));
                report.tasks.push(TaskReport {
                    name: task.name().to_string(),
                    status: TaskStatus::Skipped(UpstreamFailure(origin)),
                    duration: Duration::ZERO,
                });
                continue;
            }

            debug!(run_id, task = %task.name(), provider = %task.provider(), "running task");
            let started = Instant::now();
            let status = match self.run_task(task).await {
                Ok(TaskOutcome { outputs, written }) => {
                    report.changed_outputs.extend(written.iter().cloned());
                    info!(
                        run_id,
                        task = %task.name(),
                        outputs = outputs.len(),
                        written = written.len(),
                        "task succeeded"
                    );
                    states.insert(idx, RunState::Succeeded);
                    TaskStatus::Succeeded { outputs, written }
                }
                Err(err) => {
                    error!(run_id, task = %task.name(), error = %err, "task failed");
                    states.insert(idx, RunState::Failed);
                    TaskStatus::Failed(err)
                }
            };

            report.tasks.push(TaskReport {
                name: task.name().to_string(),
                status,
                duration: started.elapsed(),
            });
        }

        info!(
            run_id,
            success = report.success(),
            changed = report.changed_outputs.len(),
            "run finished"
        );
        report
    }

    /// Resolve inputs, invoke the provider and commit the output(s).
    ///
    /// A per-input task calls the provider once per input. Nothing is written
    /// until every call succeeded.
    async fn run_task(&mut self, task: &Task) -> Result<TaskOutcome> {
        let inputs = self.resolve_inputs(task)?;

        let kind = task.provider();
        let provider = self
            .providers
            .get(kind)
            .ok_or_else(|| PipelineError::Transform {
                task: task.name().to_string(),
                source: anyhow!("no provider registered for '{kind}'"),
            })?;

        debug!(
            task = %task.name(),
            inputs = inputs.len(),
            "invoking provider"
        );
        let fail = |source: anyhow::Error| PipelineError::Transform {
            task: task.name().to_string(),
            source,
        };

        let mut produced = Vec::new();
        match task.output() {
            TaskOutput::File(path) => {
                let content = provider.transform(&inputs, task.options()).await.map_err(fail)?;
                produced.push((path.clone(), content));
            }
            TaskOutput::Each(each) => {
                for input in &inputs {
                    let target = each.target_for(&input.path).ok_or_else(|| {
                        fail(anyhow!("input '{}' is not a file under '{}'", input.path, each.base()))
                    })?;
                    let content = provider
                        .transform(std::slice::from_ref(input), task.options())
                        .await
                        .map_err(|e| fail(e.context(format!("transforming {}", input.path))))?;
                    produced.push((target, content));
                }
            }
        }

        let mut outcome = TaskOutcome::default();
        for (path, content) in produced {
            if self.commit_output(task, &path, content)? {
                outcome.written.push(path.clone());
            }
            outcome.outputs.push(path);
        }
        Ok(outcome)
    }

    /// Write one output unless identical content is already on disk, then
    /// cache it for consumers. Returns whether the file was (re)written.
    fn commit_output(&mut self, task: &Task, path: &str, content: Vec<u8>) -> Result<bool> {
        let target = self.root.join(path);
        let content: Arc<[u8]> = content.into();
        let new_hash = hash_bytes(&content);

        let unchanged = match self.cache.output_hash(path) {
            Some(previous) => previous == new_hash && self.fs.is_file(&target),
            None => self.fs.is_file(&target)
                && self
                    .fs
                    .read(&target)
                    .map(|old| hash_bytes(&old) == new_hash)
                    .unwrap_or(false),
        };

        let written = if unchanged {
            debug!(task = %task.name(), output = %path, "output unchanged; not rewriting");
            false
        } else {
            self.fs
                .write(&target, &content)
                .map_err(|source| PipelineError::Transform {
                    task: task.name().to_string(),
                    source: source.context(format!("writing output {path}")),
                })?;
            true
        };

        self.cache.store_output(task.name(), path, content);
        Ok(written)
    }

    /// Every input artifact of `task`, pattern by pattern in declaration
    /// order, each pattern's matches sorted. A path selected by several
    /// patterns is only included once.
    fn resolve_inputs(&mut self, task: &Task) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        let mut seen = HashSet::new();

        for pattern in task.inputs() {
            let mut paths = self.resolve_pattern(task, pattern);
            paths.retain(|path| !task.is_excluded(path));
            if paths.is_empty() {
                return Err(PipelineError::DanglingInput {
                    task: task.name().to_string(),
                    input: pattern.as_str().to_string(),
                });
            }
            for path in paths {
                if seen.insert(path.clone()) {
                    artifacts.push(self.load_input(task, &path)?);
                }
            }
        }

        Ok(artifacts)
    }

    fn resolve_pattern(&self, task: &Task, pattern: &InputPattern) -> Vec<String> {
        let own = task.output();
        if !pattern.is_glob() {
            let path = pattern.as_str();
            return if !own.produces(path) && self.is_available(path) {
                vec![path.to_string()]
            } else {
                Vec::new()
            };
        }

        let mut found: BTreeSet<String> = self
            .cache
            .output_paths()
            .filter(|out| !own.produces(out) && pattern.matches(out))
            .map(str::to_string)
            .collect();
        self.collect_files(own, pattern, &mut found);
        found.into_iter().collect()
    }

    /// Walk the file system below the pattern's literal prefix and add every
    /// matching file the task does not write itself.
    fn collect_files(&self, own: &TaskOutput, pattern: &InputPattern, found: &mut BTreeSet<String>) {
        let prefix = pattern.literal_prefix();
        let rest = pattern.as_str()[prefix.len()..].trim_start_matches('/');
        let recursive = rest.contains('/') || rest.contains("**");

        let mut pending = vec![prefix.to_string()];
        while let Some(dir) = pending.pop() {
            let abs = self.root.join(&dir);
            if !self.fs.is_dir(&abs) {
                continue;
            }
            let entries = match self.fs.read_dir(&abs) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir, error = %e, "cannot list directory while expanding inputs");
                    continue;
                }
            };

            for entry in entries {
                let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                let rel = if dir.is_empty() {
                    name.to_string()
                } else {
                    format!("{dir}/{name}")
                };

                if self.fs.is_dir(&entry) {
                    if recursive {
                        pending.push(rel);
                    }
                } else if !own.produces(&rel) && pattern.matches(&rel) {
                    found.insert(rel);
                }
            }
        }
    }

    fn is_available(&self, path: &str) -> bool {
        self.cache.output(path).is_some() || self.fs.is_file(&self.root.join(path))
    }

    /// Cached artifact for task outputs, otherwise the file on disk.
    fn load_input(&mut self, task: &Task, path: &str) -> Result<Artifact> {
        if let Some(artifact) = self.cache.output(path) {
            return Ok(artifact);
        }

        let content = self
            .fs
            .read(&self.root.join(path))
            .map_err(|source| PipelineError::Transform {
                task: task.name().to_string(),
                source,
            })?;

        if self.plan.output_owner_index(path).is_none() {
            self.cache.record_source(path, &content);
        }
        Ok(Artifact::new(path, content))
    }
}

/// What a successful task wrote.
#[derive(Debug, Default)]
struct TaskOutcome {
    outputs: Vec<String>,
    /// Subset of `outputs` whose content changed on disk.
    written: Vec<String>,
}

/// The failed task responsible for `idx` being blocked in this run, if any.
fn upstream_failure(
    plan: &ExecutionPlan,
    idx: usize,
    states: &HashMap<usize, RunState>,
) -> Option<TaskName> {
    plan.producer_indices(idx)
        .into_iter()
        .find_map(|p| match states.get(&p) {
            Some(RunState::Failed) => Some(plan.task_at(p).name().to_string()),
            Some(RunState::Skipped(origin)) => Some(origin.clone()),
            _ => None,
        })
}
