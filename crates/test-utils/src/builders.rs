#![allow(dead_code)]

use assetdag::config::{ConfigFile, ConfigSection, RawConfigFile, RawEachOutput, RawTaskConfig};
use assetdag::dag::{EachOutput, Task, TaskOutput};
use assetdag::errors::Result;
use assetdag::transform::{
    ConcatOptions, ProviderKind, ScriptMinifyOptions, StyleCompileOptions, StyleMinifyOptions,
    TransformOptions,
};
use assetdag::types::RebuildMode;

/// Builder for `Task` to simplify test setup.
pub struct TaskBuilder {
    name: String,
    inputs: Vec<String>,
    output: String,
    each: Option<(String, String, String)>,
    options: TransformOptions,
}

impl TaskBuilder {
    pub fn new(name: &str, options: TransformOptions) -> Self {
        Self {
            name: name.to_string(),
            inputs: Vec::new(),
            output: format!("dist/{name}.out"),
            each: None,
            options,
        }
    }

    pub fn concat(name: &str) -> Self {
        Self::new(name, TransformOptions::Concat(ConcatOptions::default()))
    }

    pub fn script_minify(name: &str) -> Self {
        Self::new(name, TransformOptions::ScriptMinify(ScriptMinifyOptions::default()))
    }

    pub fn style_compile(name: &str) -> Self {
        Self::new(name, TransformOptions::StyleCompile(StyleCompileOptions::default()))
    }

    pub fn style_minify(name: &str) -> Self {
        Self::new(name, TransformOptions::StyleMinify(StyleMinifyOptions {}))
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.output = path.to_string();
        self
    }

    /// Write one output per input: `<base>/x.css` -> `<dest>/x<ext>`.
    pub fn each(mut self, base: &str, dest: &str, ext: &str) -> Self {
        self.each = Some((base.to_string(), dest.to_string(), ext.to_string()));
        self
    }

    pub fn options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Task {
        let output = match &self.each {
            Some((base, dest, ext)) => TaskOutput::Each(
                EachOutput::new(base, dest, ext).expect("Failed to build output mapping"),
            ),
            None => TaskOutput::file(&self.output).expect("Failed to build output path"),
        };
        Task::with_output(self.name, &self.inputs, output, self.options)
            .expect("Failed to build valid task from builder")
    }
}

/// Builder for one `[[task]]` entry.
pub struct RawTaskBuilder {
    task: RawTaskConfig,
}

impl RawTaskBuilder {
    pub fn new(name: &str, provider: ProviderKind) -> Self {
        Self {
            task: RawTaskConfig {
                name: name.to_string(),
                provider: provider.to_string(),
                inputs: Vec::new(),
                output: Some(format!("dist/{name}.out")),
                each: None,
                options: None,
            },
        }
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.output = Some(path.to_string());
        self
    }

    /// Replace the single output with a per-input mapping.
    pub fn each(mut self, base: &str, dest: &str, ext: &str) -> Self {
        self.task.output = None;
        self.task.each = Some(RawEachOutput {
            base: base.to_string(),
            dest: dest.to_string(),
            ext: ext.to_string(),
        });
        self
    }

    pub fn option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.task
            .options
            .get_or_insert_with(toml::Table::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> RawTaskConfig {
        self.task
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, task: RawTaskBuilder) -> Self {
        self.config.task.push(task.build());
        self
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn with_rebuild(mut self, mode: RebuildMode) -> Self {
        self.config.config.rebuild = mode;
        self
    }

    pub fn with_use_hash(mut self, val: bool) -> Self {
        self.config.config.use_hash = val;
        self
    }

    pub fn with_global_watch(mut self, pattern: &str) -> Self {
        self.config.config.watch.push(pattern.to_string());
        self
    }

    pub fn with_global_exclude(mut self, pattern: &str) -> Self {
        self.config.config.exclude.push(pattern.to_string());
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
