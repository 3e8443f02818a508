// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod transform;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::{ExecutionPlan, Scheduler, TaskGraph};
use crate::engine::{BuildCompleted, LogNotifier, ReloadNotifier, SessionEvent, WatchSession};
use crate::errors::PipelineError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::transform::ProviderSet;
use crate::watch::{WatchFilter, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, builds the plan, runs every task once and
/// prints the report. With `--once` that is all, and the return value says
/// whether every task succeeded. Otherwise the file watcher and a
/// [`WatchSession`] take over until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<bool> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    apply_overrides(&mut cfg, &args)?;

    let plan = TaskGraph::from_config(&cfg)?.build()?;

    if args.dry_run {
        print_dry_run(&cfg, &plan);
        return Ok(true);
    }

    let root = cfg.root().to_path_buf();
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let mut scheduler = Scheduler::new(plan, ProviderSet::builtin(&root), fs, &root);
    let notifier: Arc<dyn ReloadNotifier> = Arc::new(LogNotifier);

    let report = scheduler.run_full().await;
    print!("{}", report.render());
    let success = report.success();
    notifier.notify(&BuildCompleted::from(report));

    if args.once {
        return Ok(success);
    }

    // Watch mode.
    let (tx, rx) = mpsc::channel::<SessionEvent>(256);
    let filter = WatchFilter::from_plan(cfg.config(), scheduler.plan())?;
    let watcher = spawn_watcher(&root, filter, tx.clone())?;

    // Ctrl-C → graceful shutdown.
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(SessionEvent::ShutdownRequested).await;
        });
    }

    let debounce = Duration::from_millis(cfg.config().debounce_ms);
    let mut session = WatchSession::new(scheduler, debounce, cfg.config().rebuild, rx)
        .with_use_hash(cfg.config().use_hash);
    session.add_notifier(notifier);

    info!(root = ?watcher.root(), "watching for changes (Ctrl+C to stop)");
    session.run().await;
    Ok(true)
}

/// Command-line values win over `[config]`, under the same rules.
fn apply_overrides(cfg: &mut ConfigFile, args: &CliArgs) -> crate::errors::Result<()> {
    let section = cfg.config_mut();
    if let Some(ms) = args.debounce_ms {
        if ms == 0 {
            return Err(PipelineError::ConfigError(
                "--debounce-ms must be >= 1 (got 0)".to_string(),
            ));
        }
        section.debounce_ms = ms;
    }
    if let Some(mode) = args.rebuild {
        section.rebuild = mode;
    }
    Ok(())
}

/// Print the config and the execution plan without running anything.
fn print_dry_run(cfg: &ConfigFile, plan: &ExecutionPlan) {
    let section = cfg.config();
    println!("assetdag dry-run");
    println!("  root = {:?}", cfg.root());
    println!("  config.debounce_ms = {}", section.debounce_ms);
    println!("  config.rebuild = {:?}", section.rebuild);
    println!("  config.use_hash = {}", section.use_hash);
    if !section.watch.is_empty() {
        println!("  config.watch = {:?}", section.watch);
    }
    if !section.exclude.is_empty() {
        println!("  config.exclude = {:?}", section.exclude);
    }
    println!();

    println!("execution order ({}):", plan.len());
    for (pos, name) in plan.order().into_iter().enumerate() {
        let Some(task) = plan.task(name) else {
            continue;
        };
        println!("  {}. {name} [{}]", pos + 1, task.provider());
        let inputs: Vec<String> = task
            .inputs()
            .iter()
            .map(|p| p.to_string())
            .chain(task.excludes().iter().map(|p| format!("!{p}")))
            .collect();
        println!("      inputs: {inputs:?}");
        println!("      output: {}", task.output());
        let producers = plan.producers_of(name);
        if !producers.is_empty() {
            println!("      after: {producers:?}");
        }
    }

    debug!("dry-run complete (no execution)");
}
