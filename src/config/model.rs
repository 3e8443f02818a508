// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dag::Task;
use crate::types::RebuildMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// debounce_ms = 150
/// rebuild = "incremental"
///
/// [[task]]
/// name = "concat"
/// provider = "concat"
/// inputs = ["src/a.js", "src/b.js"]
/// output = "dist/base.js"
///
/// [[task]]
/// name = "minify"
/// provider = "script-minify"
/// inputs = ["dist/base.js"]
/// output = "dist/base.min.js"
/// [task.options]
/// preserve_identifier_names = true
///
/// [[task]]
/// name = "cssmin"
/// provider = "style-minify"
/// inputs = ["dist/*.css", "!dist/*.min.css"]
/// each = { base = "dist", dest = "static/css", ext = ".min.css" }
/// ```
///
/// Tasks are an array of tables so their declaration order survives parsing;
/// that order breaks ties in the execution plan.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub task: Vec<RawTaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Quiet period after the last change event before a rebuild starts.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// What a watch-triggered rebuild covers.
    #[serde(default)]
    pub rebuild: RebuildMode,

    /// Ignore change events whose file content hashes the same as the last
    /// time a task read it.
    #[serde(default)]
    pub use_hash: bool,

    /// Watch globs. Empty means "every task input pattern".
    #[serde(default)]
    pub watch: Vec<String>,

    /// Extra exclude globs. Declared outputs are always excluded.
    #[serde(default)]
    pub exclude: Vec<String>,
}

pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            rebuild: RebuildMode::default(),
            use_hash: false,
            watch: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// One `[[task]]` entry, before provider options are decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTaskConfig {
    pub name: String,

    /// `concat`, `script-minify`, `style-compile` or `style-minify`.
    pub provider: String,

    /// Exact paths or globs, relative to the config file's directory. A
    /// leading `!` removes matches of the rest of the pattern.
    pub inputs: Vec<String>,

    /// Single output file. Mutually exclusive with `each`.
    #[serde(default)]
    pub output: Option<String>,

    /// One output per input file.
    #[serde(default)]
    pub each: Option<RawEachOutput>,

    /// Provider-specific keys, decoded once the provider is known.
    #[serde(default)]
    pub options: Option<toml::Table>,
}

/// `each = { base, dest, ext }`: `<base>/x/site.css` becomes
/// `<dest>/x/site<ext>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEachOutput {
    #[serde(default)]
    pub base: String,
    pub dest: String,
    pub ext: String,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    tasks: Vec<Task>,
    root: PathBuf,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, tasks: Vec<Task>) -> Self {
        Self {
            config,
            tasks,
            root: PathBuf::from("."),
        }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigSection {
        &mut self.config
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Directory task paths are resolved against (the config file's parent).
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}
