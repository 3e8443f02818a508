// src/transform/mod.rs

//! Transform providers: the pluggable functions that turn input artifacts
//! into an output artifact.
//!
//! The scheduler only knows the [`TransformProvider`] trait and dispatches on
//! the [`ProviderKind`] tag of a task's [`TransformOptions`]. Tests swap in
//! fake providers through [`ProviderSet::register`].
//!
//! - [`concat`] joins inputs in declaration order.
//! - [`script`] pipes scripts through an external `esbuild` process.
//! - [`styles`] compiles and minifies stylesheets with `grass`.

pub mod concat;
pub mod script;
pub mod styles;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::errors::{PipelineError, Result};

pub use concat::Concatenator;
pub use script::ScriptMinifier;
pub use styles::{StyleCompiler, StyleMinifier};

/// A named blob of bytes produced or consumed by a task.
///
/// `path` is normalised and relative to the project root. Content is shared
/// so cached artifacts can be handed to several consumers without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: String,
    pub content: Arc<[u8]>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, content: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Identifier of a transform provider, as written in `provider = "..."`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    Concat,
    ScriptMinify,
    StyleCompile,
    StyleMinify,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Concat => "concat",
            ProviderKind::ScriptMinify => "script-minify",
            ProviderKind::StyleCompile => "style-compile",
            ProviderKind::StyleMinify => "style-minify",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "concat" => Ok(ProviderKind::Concat),
            "script-minify" => Ok(ProviderKind::ScriptMinify),
            "style-compile" => Ok(ProviderKind::StyleCompile),
            "style-minify" => Ok(ProviderKind::StyleMinify),
            other => Err(format!(
                "unknown provider: {other} (expected \"concat\", \"script-minify\", \"style-compile\" or \"style-minify\")"
            )),
        }
    }
}

/// `[task.options]` for `provider = "concat"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConcatOptions {
    /// Inserted between consecutive inputs.
    pub separator: String,
    /// Prepended once to the result.
    pub banner: Option<String>,
}

impl Default for ConcatOptions {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            banner: None,
        }
    }
}

/// `[task.options]` for `provider = "script-minify"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptMinifyOptions {
    /// Keep local identifier names instead of mangling them.
    pub preserve_identifier_names: bool,
    /// Apply syntax-level compression.
    pub apply_compression: bool,
    /// Keep whitespace and line breaks.
    pub emit_readable_output: bool,
    /// Minifier executable, looked up on `PATH`.
    pub command: String,
}

impl Default for ScriptMinifyOptions {
    fn default() -> Self {
        Self {
            preserve_identifier_names: false,
            apply_compression: true,
            emit_readable_output: false,
            command: "esbuild".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleOutput {
    #[default]
    Expanded,
    Compressed,
}

/// `[task.options]` for `provider = "style-compile"`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleCompileOptions {
    pub output_style: StyleOutput,
    /// Extra `@import` search directories, relative to the project root.
    pub load_paths: Vec<String>,
}

/// `[task.options]` for `provider = "style-minify"`. Takes no keys.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleMinifyOptions {}

/// Provider-specific options, tagged by provider.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOptions {
    Concat(ConcatOptions),
    ScriptMinify(ScriptMinifyOptions),
    StyleCompile(StyleCompileOptions),
    StyleMinify(StyleMinifyOptions),
}

impl TransformOptions {
    pub fn kind(&self) -> ProviderKind {
        match self {
            TransformOptions::Concat(_) => ProviderKind::Concat,
            TransformOptions::ScriptMinify(_) => ProviderKind::ScriptMinify,
            TransformOptions::StyleCompile(_) => ProviderKind::StyleCompile,
            TransformOptions::StyleMinify(_) => ProviderKind::StyleMinify,
        }
    }

    /// Default options for a provider.
    pub fn defaults_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Concat => TransformOptions::Concat(ConcatOptions::default()),
            ProviderKind::ScriptMinify => {
                TransformOptions::ScriptMinify(ScriptMinifyOptions::default())
            }
            ProviderKind::StyleCompile => {
                TransformOptions::StyleCompile(StyleCompileOptions::default())
            }
            ProviderKind::StyleMinify => TransformOptions::StyleMinify(StyleMinifyOptions {}),
        }
    }

    /// Decode a raw `[task.options]` table into the record of `kind`.
    pub fn from_table(kind: ProviderKind, table: Option<toml::Table>) -> Result<Self> {
        let Some(table) = table else {
            return Ok(Self::defaults_for(kind));
        };
        let value = toml::Value::Table(table);

        let decoded = match kind {
            ProviderKind::Concat => value.try_into().map(TransformOptions::Concat),
            ProviderKind::ScriptMinify => value.try_into().map(TransformOptions::ScriptMinify),
            ProviderKind::StyleCompile => value.try_into().map(TransformOptions::StyleCompile),
            ProviderKind::StyleMinify => value.try_into().map(TransformOptions::StyleMinify),
        };

        decoded.map_err(|e| {
            PipelineError::ConfigError(format!("invalid options for provider '{kind}': {e}"))
        })
    }
}

/// Future returned by [`TransformProvider::transform`].
pub type TransformFuture<'a> =
    Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send + 'a>>;

/// A pure `(inputs, options) -> output bytes` function.
///
/// Implementations must not write files; the scheduler owns all artifact
/// writes so a failed transform never clobbers the last good output.
pub trait TransformProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn transform<'a>(
        &'a self,
        inputs: &'a [Artifact],
        options: &'a TransformOptions,
    ) -> TransformFuture<'a>;
}

/// Registry of providers keyed by [`ProviderKind`].
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<ProviderKind, Arc<dyn TransformProvider>>,
}

impl fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort();
        f.debug_struct("ProviderSet").field("kinds", &kinds).finish()
    }
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four built-in providers. `root` is the project root, used to
    /// resolve stylesheet load paths.
    pub fn builtin(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut set = Self::new();
        set.register(Concatenator);
        set.register(ScriptMinifier);
        set.register(StyleCompiler::new(root));
        set.register(StyleMinifier);
        set
    }

    /// Register `provider`, replacing any provider of the same kind.
    pub fn register<P>(&mut self, provider: P) -> &mut Self
    where
        P: TransformProvider + 'static,
    {
        self.providers.insert(provider.kind(), Arc::new(provider));
        self
    }

    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn TransformProvider>> {
        self.providers.get(&kind).cloned()
    }
}

/// Concatenate artifact contents with `separator` between them.
pub(crate) fn join_inputs(inputs: &[Artifact], separator: &[u8]) -> Vec<u8> {
    let total: usize = inputs.iter().map(|a| a.content.len() + separator.len()).sum();
    let mut out = Vec::with_capacity(total);
    for (i, artifact) in inputs.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(separator);
        }
        out.extend_from_slice(&artifact.content);
    }
    out
}

/// Error for a provider handed options of another provider. Cannot happen for
/// tasks built through [`crate::dag::Task::new`], which derive the provider from
/// the options.
pub(crate) fn options_mismatch(expected: ProviderKind, got: &TransformOptions) -> anyhow::Error {
    anyhow::anyhow!(
        "provider '{expected}' received options for '{}'",
        got.kind()
    )
}
