pub mod builders;
pub mod fake_provider;

use std::path::Path;
use std::sync::{Arc, Once};

use assetdag::dag::{Scheduler, Task, TaskGraph};
use assetdag::fs::mock::MockFileSystem;
use assetdag::transform::ProviderSet;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// In-memory file system pre-populated with `(path, content)` pairs.
pub fn mock_fs_with(files: &[(&str, &str)]) -> MockFileSystem {
    let fs = MockFileSystem::new();
    for (path, content) in files {
        fs.add_file(path, content.as_bytes());
    }
    fs
}

/// Build a plan from `tasks` and wrap it in a scheduler rooted at `""` on
/// the given mock file system.
pub fn scheduler_on(tasks: Vec<Task>, fs: &MockFileSystem, providers: ProviderSet) -> Scheduler {
    let mut graph = TaskGraph::new();
    for task in tasks {
        graph.add_task(task).expect("unique task names");
    }
    let plan = graph.build().expect("acyclic task graph");
    Scheduler::new(plan, providers, Arc::new(fs.clone()), Path::new(""))
}

/// Read a file from the mock file system as UTF-8.
pub fn read_str(fs: &MockFileSystem, path: &str) -> Option<String> {
    fs.contents(path)
        .map(|bytes| String::from_utf8(bytes).expect("utf-8 content"))
}
