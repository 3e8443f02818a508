use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use assetdag::transform::{
    Artifact, ProviderKind, TransformFuture, TransformOptions, TransformProvider,
};

/// A fake transform provider that:
/// - records the input paths of every invocation
/// - joins its inputs with `+` and wraps them as `<kind>(...)`, so tests can
///   see which provider produced an artifact and from what
/// - fails when any input contains a configured marker
/// - optionally sleeps before answering (for overlap tests on a paused clock)
#[derive(Debug, Clone)]
pub struct FakeProvider {
    kind: ProviderKind,
    fail_marker: Option<String>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FakeProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            fail_marker: None,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Input paths of every invocation so far, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// What this provider produces for the given input contents.
    pub fn expected_output(kind: ProviderKind, contents: &[&str]) -> String {
        format!("{kind}({})", contents.join("+"))
    }
}

impl TransformProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn transform<'a>(
        &'a self,
        inputs: &'a [Artifact],
        _options: &'a TransformOptions,
    ) -> TransformFuture<'a> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(inputs.iter().map(|a| a.path.clone()).collect());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let contents: Vec<String> = inputs
                .iter()
                .map(|a| String::from_utf8_lossy(&a.content).into_owned())
                .collect();

            if let Some(marker) = &self.fail_marker {
                if contents.iter().any(|c| c.contains(marker.as_str())) {
                    return Err(anyhow!("fake {} failure: input contains {marker:?}", self.kind));
                }
            }

            let refs: Vec<&str> = contents.iter().map(String::as_str).collect();
            Ok(Self::expected_output(self.kind, &refs).into_bytes())
        })
    }
}
