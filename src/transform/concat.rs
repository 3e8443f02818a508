// src/transform/concat.rs

use std::future;

use crate::transform::{
    Artifact, ProviderKind, TransformFuture, TransformOptions, TransformProvider, join_inputs,
    options_mismatch,
};

/// Joins inputs in the order they were resolved, optionally behind a banner.
#[derive(Debug, Clone, Copy, Default)]
pub struct Concatenator;

impl TransformProvider for Concatenator {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Concat
    }

    fn transform<'a>(
        &'a self,
        inputs: &'a [Artifact],
        options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        let result = match options {
            TransformOptions::Concat(opts) => {
                let body = join_inputs(inputs, opts.separator.as_bytes());
                match &opts.banner {
                    Some(banner) => {
                        let mut out = Vec::with_capacity(banner.len() + body.len());
                        out.extend_from_slice(banner.as_bytes());
                        out.extend_from_slice(&body);
                        Ok(out)
                    }
                    None => Ok(body),
                }
            }
            other => Err(options_mismatch(ProviderKind::Concat, other)),
        };
        Box::pin(future::ready(result))
    }
}
