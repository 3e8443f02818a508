// src/transform/styles.rs

use std::future;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};

use crate::transform::{
    Artifact, ProviderKind, StyleOutput, TransformFuture, TransformOptions, TransformProvider,
    join_inputs, options_mismatch,
};

/// Compiles SCSS to CSS.
///
/// `@import` is resolved against the directory of the first input plus the
/// configured `load_paths`, both relative to the project root.
#[derive(Debug, Clone)]
pub struct StyleCompiler {
    root: PathBuf,
}

impl StyleCompiler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn compile(&self, inputs: &[Artifact], options: &TransformOptions) -> anyhow::Result<Vec<u8>> {
        let opts = match options {
            TransformOptions::StyleCompile(opts) => opts,
            other => return Err(options_mismatch(ProviderKind::StyleCompile, other)),
        };

        let style = match opts.output_style {
            StyleOutput::Expanded => grass::OutputStyle::Expanded,
            StyleOutput::Compressed => grass::OutputStyle::Compressed,
        };

        let mut load_paths: Vec<PathBuf> = Vec::new();
        if let Some(first) = inputs.first() {
            let parent = Path::new(&first.path).parent().unwrap_or(Path::new(""));
            load_paths.push(self.root.join(parent));
        }
        load_paths.extend(opts.load_paths.iter().map(|p| self.root.join(p)));

        let mut grass_opts = grass::Options::default().style(style);
        for path in &load_paths {
            grass_opts = grass_opts.load_path(path);
        }

        let source = source_text(inputs)?;
        let css = grass::from_string(source, &grass_opts).map_err(|e| anyhow!("{e}"))?;
        Ok(css.into_bytes())
    }
}

impl TransformProvider for StyleCompiler {
    fn kind(&self) -> ProviderKind {
        ProviderKind::StyleCompile
    }

    fn transform<'a>(
        &'a self,
        inputs: &'a [Artifact],
        options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(future::ready(self.compile(inputs, options)))
    }
}

/// Minifies plain CSS.
///
/// Every input is parsed, so malformed stylesheets fail the task instead of
/// being passed through.
#[derive(Debug, Clone, Copy, Default)]
pub struct StyleMinifier;

impl StyleMinifier {
    fn minify(inputs: &[Artifact], options: &TransformOptions) -> anyhow::Result<Vec<u8>> {
        if !matches!(options, TransformOptions::StyleMinify(_)) {
            return Err(options_mismatch(ProviderKind::StyleMinify, options));
        }

        let grass_opts = grass::Options::default().style(grass::OutputStyle::Compressed);
        let source = source_text(inputs)?;
        let css = grass::from_string(source, &grass_opts).map_err(|e| anyhow!("{e}"))?;
        Ok(css.into_bytes())
    }
}

impl TransformProvider for StyleMinifier {
    fn kind(&self) -> ProviderKind {
        ProviderKind::StyleMinify
    }

    fn transform<'a>(
        &'a self,
        inputs: &'a [Artifact],
        options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(future::ready(Self::minify(inputs, options)))
    }
}

fn source_text(inputs: &[Artifact]) -> anyhow::Result<String> {
    let joined = join_inputs(inputs, b"\n");
    String::from_utf8(joined).context("stylesheet input is not valid UTF-8")
}
