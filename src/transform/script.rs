// src/transform/script.rs

//! Script minification through an external `esbuild` process.
//!
//! Inputs are concatenated (newline separated) and streamed to the minifier
//! on stdin; the minified result is read back from stdout.

use std::process::Stdio;

use anyhow::{Context, anyhow};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::transform::{
    Artifact, ProviderKind, ScriptMinifyOptions, TransformFuture, TransformOptions,
    TransformProvider, join_inputs, options_mismatch,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptMinifier;

/// Command-line flags for the minifier, derived from the task options.
pub fn minifier_args(opts: &ScriptMinifyOptions) -> Vec<&'static str> {
    let mut args = vec!["--loader=js", "--log-level=error"];
    if !opts.emit_readable_output {
        args.push("--minify-whitespace");
    }
    if !opts.preserve_identifier_names {
        args.push("--minify-identifiers");
    }
    if opts.apply_compression {
        args.push("--minify-syntax");
    }
    args
}

impl TransformProvider for ScriptMinifier {
    fn kind(&self) -> ProviderKind {
        ProviderKind::ScriptMinify
    }

    fn transform<'a>(
        &'a self,
        inputs: &'a [Artifact],
        options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move {
            let opts = match options {
                TransformOptions::ScriptMinify(opts) => opts,
                other => return Err(options_mismatch(ProviderKind::ScriptMinify, other)),
            };
            let source = join_inputs(inputs, b"\n");
            run_minifier(opts, source).await
        })
    }
}

async fn run_minifier(opts: &ScriptMinifyOptions, source: Vec<u8>) -> anyhow::Result<Vec<u8>> {
    let args = minifier_args(opts);
    debug!(cmd = %opts.command, ?args, bytes = source.len(), "starting script minifier");

    let mut child = Command::new(&opts.command)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning script minifier '{}'", opts.command))?;

    // Feed stdin from its own task so a large input cannot deadlock against
    // a full stdout pipe.
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("minifier stdin was not captured"))?;
    let writer = tokio::spawn(async move {
        let res = stdin.write_all(&source).await;
        drop(stdin);
        res
    });

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for script minifier '{}'", opts.command))?;

    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "failed to write minifier stdin"),
        Err(e) => warn!(error = %e, "minifier stdin writer panicked"),
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "script minifier exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    Ok(output.stdout)
}
