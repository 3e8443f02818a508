// src/dag/task.rs

//! Task declarations: a name, input patterns, an output and typed options.

use std::fmt;

use globset::{GlobBuilder, GlobMatcher};

use crate::errors::{PipelineError, Result};
use crate::fs::normalize_rel;
use crate::transform::{ProviderKind, TransformOptions};

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// One entry of a task's `inputs` list.
///
/// Either an exact project-relative path (`src/base.js`) or a glob
/// (`dist/*.css`). Exact paths are compared after normalisation; globs do
/// not cross `/` with a single `*`.
#[derive(Clone)]
pub struct InputPattern {
    raw: String,
    matcher: Option<GlobMatcher>,
}

impl fmt::Debug for InputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InputPattern").field(&self.raw).finish()
    }
}

impl fmt::Display for InputPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl InputPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let raw = normalize_rel(pattern);
        if raw.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "empty input pattern {pattern:?}"
            )));
        }

        let matcher = if raw.contains(GLOB_META) {
            let glob = GlobBuilder::new(&raw)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    PipelineError::ConfigError(format!("invalid glob pattern {raw:?}: {e}"))
                })?;
            Some(glob.compile_matcher())
        } else {
            None
        };

        Ok(Self { raw, matcher })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_glob(&self) -> bool {
        self.matcher.is_some()
    }

    /// Whether a normalised project-relative path is selected by this input.
    pub fn matches(&self, path: &str) -> bool {
        match &self.matcher {
            Some(m) => m.is_match(path),
            None => self.raw == path,
        }
    }

    /// The directory part of the pattern that contains no glob syntax.
    ///
    /// `src/js/*.js` -> `src/js`, `**/*.css` -> `""`. For exact paths this is
    /// the parent directory.
    pub fn literal_prefix(&self) -> &str {
        let mut end = 0;
        for (idx, _) in self.raw.match_indices('/') {
            if self.raw[..idx].contains(GLOB_META) {
                break;
            }
            end = idx;
        }
        &self.raw[..end]
    }

    /// Literal tail of the last path component after its final glob
    /// character: `dist/*.min.css` -> `.min.css`. Empty for exact paths.
    pub fn literal_suffix(&self) -> &str {
        if !self.is_glob() {
            return "";
        }
        let file = self.raw.rsplit('/').next().unwrap_or(&self.raw);
        match file.rfind(['*', '?', ']', '}']) {
            Some(idx) => &file[idx + 1..],
            None => file,
        }
    }
}

/// How a task names the file(s) it writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    /// Every resolved input goes through the provider together and lands in
    /// this one file.
    File(String),
    /// Every resolved input goes through the provider on its own and lands
    /// next to its siblings under a destination directory.
    Each(EachOutput),
}

impl TaskOutput {
    /// A single concrete output path.
    pub fn file(path: &str) -> Result<Self> {
        let path = normalize_rel(path);
        if path.is_empty() || path.contains(GLOB_META) {
            return Err(PipelineError::ConfigError(format!(
                "output must be a concrete path (got {path:?})"
            )));
        }
        Ok(TaskOutput::File(path))
    }

    /// The single output path, when there is one.
    pub fn as_file(&self) -> Option<&str> {
        match self {
            TaskOutput::File(path) => Some(path),
            TaskOutput::Each(_) => None,
        }
    }

    /// Whether `path` is (or would be) written by this output.
    pub fn produces(&self, path: &str) -> bool {
        match self {
            TaskOutput::File(file) => file == path,
            TaskOutput::Each(each) => each.covers(path),
        }
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutput::File(path) => f.write_str(path),
            TaskOutput::Each(each) => write!(f, "{}", each.as_glob()),
        }
    }
}

/// Per-input output mapping: `<base>/<rel>/<stem>.<anything>` is written to
/// `<dest>/<rel>/<stem><ext>`.
///
/// The stem is the file name up to its first dot, so with `ext = ".min.css"`
/// both `dist/site.css` and `dist/site.print.css` map to `site.min.css`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EachOutput {
    base: String,
    dest: String,
    ext: String,
}

impl EachOutput {
    pub fn new(base: &str, dest: &str, ext: &str) -> Result<Self> {
        let base = normalize_rel(base);
        let dest = normalize_rel(dest);
        if base.contains(GLOB_META) || dest.contains(GLOB_META) {
            return Err(PipelineError::ConfigError(format!(
                "`base` and `dest` must be plain directories (got {base:?} and {dest:?})"
            )));
        }
        if !ext.starts_with('.') || ext.len() < 2 || ext.contains('/') || ext.contains(GLOB_META) {
            return Err(PipelineError::ConfigError(format!(
                "`ext` must be a file extension such as \".min.css\" (got {ext:?})"
            )));
        }
        Ok(Self {
            base,
            dest,
            ext: ext.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn dest(&self) -> &str {
        &self.dest
    }

    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Output path for one input, or `None` when the input does not live
    /// under `base` or has no file stem.
    pub fn target_for(&self, input: &str) -> Option<String> {
        let rel = strip_dir(input, &self.base)?;
        let (dir, file) = match rel.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, rel),
        };
        let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
        if stem.is_empty() {
            return None;
        }

        let target = match dir {
            Some(dir) => format!("{}/{dir}/{stem}{}", self.dest, self.ext),
            None => format!("{}/{stem}{}", self.dest, self.ext),
        };
        Some(normalize_rel(&target))
    }

    /// Whether `path` has the shape of a file this mapping writes.
    pub fn covers(&self, path: &str) -> bool {
        strip_dir(path, &self.dest).is_some_and(|rel| {
            let file = rel.rsplit('/').next().unwrap_or(rel);
            file.len() > self.ext.len() && file.ends_with(&self.ext)
        })
    }

    /// Glob selecting every file this mapping can write.
    pub fn as_glob(&self) -> String {
        if self.dest.is_empty() {
            format!("**/*{}", self.ext)
        } else {
            format!("{}/**/*{}", self.dest, self.ext)
        }
    }

    /// A representative file this mapping writes, directly under `dest`.
    fn sample_target(&self) -> String {
        normalize_rel(&format!("{}/_{}", self.dest, self.ext))
    }

    /// Conservative overlap test between this mapping and an input pattern
    /// of another task: the directories must nest and the pattern's file name
    /// suffix must be compatible with `ext`.
    fn may_feed(&self, pattern: &InputPattern) -> bool {
        if !pattern.is_glob() {
            return self.covers(pattern.as_str());
        }
        let prefix = pattern.literal_prefix();
        if strip_dir(prefix, &self.dest).is_none() && strip_dir(&self.dest, prefix).is_none() {
            return false;
        }
        let suffix = pattern.literal_suffix();
        self.ext.ends_with(suffix) || suffix.ends_with(self.ext.as_str())
    }
}

/// `path` relative to `dir`, or `None` when it is not inside it. A path
/// equal to `dir` is inside it.
fn strip_dir<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    if dir.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(dir)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix('/')
}

/// A single pipeline step.
///
/// The provider is implied by the options variant, so a task can never be
/// wired to a provider that does not understand its options.
#[derive(Debug, Clone)]
pub struct Task {
    name: TaskName,
    inputs: Vec<InputPattern>,
    /// Inputs written with a leading `!`; they remove matches from `inputs`.
    excludes: Vec<InputPattern>,
    output: TaskOutput,
    options: TransformOptions,
}

impl Task {
    /// A task writing one output file.
    pub fn new<N, I, S>(name: N, inputs: I, output: &str, options: TransformOptions) -> Result<Self>
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        let output = TaskOutput::file(output).map_err(|e| match e {
            PipelineError::ConfigError(msg) => {
                PipelineError::ConfigError(format!("task '{name}': {msg}"))
            }
            other => other,
        })?;
        Self::with_output(name, inputs, output, options)
    }

    pub fn with_output<N, I, S>(
        name: N,
        inputs: I,
        output: TaskOutput,
        options: TransformOptions,
    ) -> Result<Self>
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PipelineError::ConfigError(
                "task name must not be empty".to_string(),
            ));
        }

        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for raw in inputs {
            let raw = raw.as_ref();
            match raw.strip_prefix('!') {
                Some(negated) => excludes.push(InputPattern::new(negated)?),
                None => includes.push(InputPattern::new(raw)?),
            }
        }
        if includes.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "task '{name}' must declare at least one input that is not negated"
            )));
        }

        Ok(Self {
            name,
            inputs: includes,
            excludes,
            output,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selecting input patterns, in declaration order.
    pub fn inputs(&self) -> &[InputPattern] {
        &self.inputs
    }

    /// Negated input patterns, without their `!`.
    pub fn excludes(&self) -> &[InputPattern] {
        &self.excludes
    }

    pub fn output(&self) -> &TaskOutput {
        &self.output
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    pub fn provider(&self) -> ProviderKind {
        self.options.kind()
    }

    /// Whether a negated input rules `path` out.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|p| p.matches(path))
    }

    /// Whether any input pattern selects `path` and no negated one removes it.
    pub fn consumes(&self, path: &str) -> bool {
        self.inputs.iter().any(|p| p.matches(path)) && !self.is_excluded(path)
    }

    /// Whether this task reads something `producer` writes.
    pub fn consumes_output_of(&self, producer: &Task) -> bool {
        match producer.output() {
            TaskOutput::File(path) => self.consumes(path),
            TaskOutput::Each(each) => self.inputs.iter().any(|p| {
                let witness = if p.is_glob() {
                    each.sample_target()
                } else {
                    p.as_str().to_string()
                };
                each.may_feed(p) && !self.is_excluded(&witness)
            }),
        }
    }
}
