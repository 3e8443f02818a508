// src/dag/cache.rs

use std::collections::HashMap;
use std::sync::Arc;

use blake3::Hasher;
use tracing::debug;

use crate::dag::task::TaskName;
use crate::transform::Artifact;

/// Hex-encoded blake3 digest of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(bytes);
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone)]
struct CachedOutput {
    producer: TaskName,
    content: Arc<[u8]>,
    hash: String,
}

/// In-memory store of the artifacts produced so far, plus the hashes of
/// source files as they were last read.
///
/// Lives as long as the scheduler, so watch-mode subset runs can reuse the
/// outputs of tasks they do not re-execute.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    outputs: HashMap<String, CachedOutput>,
    sources: HashMap<String, String>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last successful output at `path`, if any task produced one.
    pub fn output(&self, path: &str) -> Option<Artifact> {
        self.outputs.get(path).map(|o| Artifact {
            path: path.to_string(),
            content: Arc::clone(&o.content),
        })
    }

    /// Paths of every cached output, in no particular order.
    pub fn output_paths(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn output_hash(&self, path: &str) -> Option<&str> {
        self.outputs.get(path).map(|o| o.hash.as_str())
    }

    pub fn producer_of(&self, path: &str) -> Option<&str> {
        self.outputs.get(path).map(|o| o.producer.as_str())
    }

    /// Store a task output. Returns `true` when the content differs from the
    /// previously cached output (or there was none).
    pub fn store_output(&mut self, producer: &str, path: &str, content: Arc<[u8]>) -> bool {
        let hash = hash_bytes(&content);
        let changed = self.output_hash(path) != Some(hash.as_str());
        debug!(task = %producer, output = %path, changed, "caching artifact");
        self.outputs.insert(
            path.to_string(),
            CachedOutput {
                producer: producer.to_string(),
                content,
                hash,
            },
        );
        changed
    }

    /// Remember the hash of a source file as read by a task.
    pub fn record_source(&mut self, path: &str, content: &[u8]) {
        self.sources.insert(path.to_string(), hash_bytes(content));
    }

    pub fn source_hash(&self, path: &str) -> Option<&str> {
        self.sources.get(path).map(String::as_str)
    }

    pub fn forget_source(&mut self, path: &str) {
        if self.sources.remove(path).is_some() {
            debug!(path = %path, "forgot source hash");
        }
    }
}
