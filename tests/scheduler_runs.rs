// tests/scheduler_runs.rs

mod common;
use crate::common::{script_pipeline, task};

use std::collections::BTreeSet;
use std::error::Error;

use assetdag::dag::TaskStatus;
use assetdag::errors::PipelineError;
use assetdag::transform::ProviderKind::{Concat, ScriptMinify, StyleCompile, StyleMinify};
use assetdag::transform::ProviderSet;
use assetdag::types::RunKind;
use assetdag_test_utils::builders::TaskBuilder;
use assetdag_test_utils::fake_provider::FakeProvider;
use assetdag_test_utils::{init_tracing, mock_fs_with, read_str, scheduler_on};

type TestResult = Result<(), Box<dyn Error>>;

fn paths(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn concat_then_minify_rebuilds_only_on_tracked_changes() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "var a = 1;"), ("src/b.js", "var b = 2;")]);
    let minifier = FakeProvider::new(ScriptMinify);
    let mut providers = ProviderSet::builtin("");
    providers.register(minifier.clone());
    let mut scheduler = scheduler_on(script_pipeline(), &fs, providers);

    let report = scheduler.run_full().await;
    assert!(report.success(), "{}", report.render());
    assert_eq!(report.kind, RunKind::Full);
    assert_eq!(report.executed(), vec!["concat", "minify"]);
    assert_eq!(report.changed_outputs, vec!["dist/base.js", "dist/base.min.js"]);
    assert_eq!(
        read_str(&fs, "dist/base.js").as_deref(),
        Some("var a = 1;\nvar b = 2;")
    );
    assert_eq!(
        read_str(&fs, "dist/base.min.js"),
        Some(FakeProvider::expected_output(
            ScriptMinify,
            &["var a = 1;\nvar b = 2;"]
        ))
    );
    assert_eq!(scheduler.cache().producer_of("dist/base.js"), Some("concat"));
    assert_eq!(scheduler.plan().producer_of_output("dist/base.min.js"), Some("minify"));
    assert!(scheduler.cache().source_hash("src/a.js").is_some());

    // Edit a tracked source: both tasks re-run, producer first.
    fs.add_file("src/b.js", "var b = 3;");
    let report = scheduler.run_subset(&paths(&["src/b.js"])).await;
    assert_eq!(report.kind, RunKind::Incremental);
    assert_eq!(report.executed(), vec!["concat", "minify"]);
    assert_eq!(
        read_str(&fs, "dist/base.js").as_deref(),
        Some("var a = 1;\nvar b = 3;")
    );
    assert_eq!(minifier.calls(), vec![vec!["dist/base.js"], vec!["dist/base.js"]]);

    // A file no task consumes triggers nothing.
    fs.add_file("src/c.js", "var c;");
    let report = scheduler.run_subset(&paths(&["src/c.js"])).await;
    assert!(report.is_empty());
    assert!(report.success());
    assert_eq!(minifier.call_count(), 2);
    Ok(())
}

#[tokio::test]
async fn subset_run_reuses_cached_outputs_of_untouched_producers() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "A"), ("src/b.js", "B")]);
    let concat = FakeProvider::new(Concat);
    let mut providers = ProviderSet::new();
    providers.register(concat.clone());

    let bundle = TaskBuilder::concat("C")
        .input("dist/a.js")
        .input("dist/b.js")
        .output("dist/c.js")
        .build();
    let mut scheduler = scheduler_on(
        vec![
            task("A", Concat, "src/a.js", "dist/a.js"),
            task("B", Concat, "src/b.js", "dist/b.js"),
            bundle,
        ],
        &fs,
        providers,
    );

    assert!(scheduler.run_full().await.success());
    assert_eq!(concat.call_count(), 3);

    fs.add_file("src/a.js", "A2");
    let report = scheduler.run_subset(&paths(&["src/a.js"])).await;
    assert_eq!(report.executed(), vec!["A", "C"]);

    let calls = concat.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(calls[3], vec!["src/a.js"]);
    assert_eq!(calls[4], vec!["dist/a.js", "dist/b.js"]);
    assert_eq!(
        read_str(&fs, "dist/c.js"),
        Some(FakeProvider::expected_output(
            Concat,
            &[
                &FakeProvider::expected_output(Concat, &["A2"]),
                &FakeProvider::expected_output(Concat, &["B"]),
            ]
        ))
    );
    Ok(())
}

#[tokio::test]
async fn subset_result_matches_a_fresh_full_run() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "let a;"), ("src/b.js", "let b;")]);
    let mut providers = ProviderSet::builtin("");
    providers.register(FakeProvider::new(ScriptMinify));
    let mut scheduler = scheduler_on(script_pipeline(), &fs, providers.clone());

    scheduler.run_full().await;
    fs.add_file("src/a.js", "let a = 'changed';");
    scheduler.run_subset(&paths(&["src/a.js"])).await;

    let incremental = (
        read_str(&fs, "dist/base.js"),
        read_str(&fs, "dist/base.min.js"),
    );

    // A brand-new scheduler (empty cache) over the same sources must agree,
    // and therefore rewrite nothing.
    let mut fresh = scheduler_on(script_pipeline(), &fs, providers);
    let report = fresh.run_full().await;
    assert!(report.success());
    assert!(report.changed_outputs.is_empty());
    assert_eq!(
        incremental,
        (read_str(&fs, "dist/base.js"), read_str(&fs, "dist/base.min.js"))
    );
    Ok(())
}

#[tokio::test]
async fn repeated_full_runs_are_idempotent() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "1"), ("src/b.js", "2")]);
    let mut providers = ProviderSet::builtin("");
    providers.register(FakeProvider::new(ScriptMinify));
    let mut scheduler = scheduler_on(script_pipeline(), &fs, providers);

    let first = scheduler.run_full().await;
    let before = (read_str(&fs, "dist/base.js"), read_str(&fs, "dist/base.min.js"));
    let second = scheduler.run_full().await;

    assert!(first.success() && second.success());
    assert_eq!(second.run_id, first.run_id + 1);
    assert!(second.changed_outputs.is_empty());
    assert_eq!(
        before,
        (read_str(&fs, "dist/base.js"), read_str(&fs, "dist/base.min.js"))
    );
    assert_eq!(fs.write_count("dist/base.js"), 1);
    assert_eq!(fs.write_count("dist/base.min.js"), 1);
    assert!(matches!(
        second.status_of("minify"),
        Some(TaskStatus::Succeeded { outputs, written })
            if outputs == &["dist/base.min.js"] && written.is_empty()
    ));
    Ok(())
}

#[tokio::test]
async fn failure_skips_dependents_and_spares_independent_tasks() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[
        ("src/a.js", "BROKEN"),
        ("src/d.js", "fine"),
        ("dist/b.css", "last good"),
    ]);
    let concat = FakeProvider::new(Concat);
    let styles = FakeProvider::new(StyleMinify).failing_on("BROKEN");
    let mut providers = ProviderSet::new();
    providers.register(concat.clone()).register(styles.clone());

    let mut scheduler = scheduler_on(
        vec![
            task("A", Concat, "src/a.js", "dist/a.js"),
            task("B", StyleMinify, "dist/a.js", "dist/b.css"),
            task("C", Concat, "dist/b.css", "dist/c.css"),
            task("D", Concat, "src/d.js", "dist/d.js"),
            task("E", Concat, "dist/c.css", "dist/e.css"),
        ],
        &fs,
        providers,
    );

    let report = scheduler.run_full().await;

    assert!(!report.success());
    assert_eq!(report.failed_tasks(), vec!["B"]);
    assert_eq!(report.skipped_tasks(), vec!["C", "E"]);
    assert!(matches!(
        report.status_of("B"),
        Some(TaskStatus::Failed(PipelineError::Transform { task, .. })) if task == "B"
    ));
    for skipped in ["C", "E"] {
        match report.status_of(skipped) {
            Some(TaskStatus::Skipped(reason)) => assert_eq!(reason.failed_task(), "B"),
            other => panic!("{skipped}: expected Skipped, got {other:?}"),
        }
    }
    assert!(report.status_of("A").is_some_and(|s| s.is_success()));
    assert!(report.status_of("D").is_some_and(|s| s.is_success()));

    // The failed task's previous output is untouched, downstream never written.
    assert_eq!(read_str(&fs, "dist/b.css").as_deref(), Some("last good"));
    assert_eq!(fs.write_count("dist/b.css"), 0);
    assert!(fs.contents("dist/c.css").is_none());
    assert!(fs.contents("dist/d.js").is_some());
    Ok(())
}

#[tokio::test]
async fn malformed_stylesheet_fails_only_its_own_branch() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[
        ("src/site.css", "a { color: red;"),
        ("src/app.js", "let app;"),
        ("dist/site.min.css", "previous"),
    ]);
    let mut scheduler = scheduler_on(
        vec![
            task("css", StyleMinify, "src/site.css", "dist/site.min.css"),
            task("js", Concat, "src/app.js", "dist/app.js"),
        ],
        &fs,
        ProviderSet::builtin(""),
    );

    let report = scheduler.run_full().await;

    assert!(!report.success());
    assert_eq!(report.failed_tasks(), vec!["css"]);
    assert_eq!(read_str(&fs, "dist/app.js").as_deref(), Some("let app;"));
    assert_eq!(read_str(&fs, "dist/site.min.css").as_deref(), Some("previous"));
    let rendered = report.render();
    assert!(rendered.contains("FAILED"));
    assert!(rendered.contains(&format!("in {}ms", report.total_duration().as_millis())));
    Ok(())
}

#[tokio::test]
async fn input_matching_nothing_is_a_dangling_input_failure() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/present.js", "x")]);
    let mut scheduler = scheduler_on(
        vec![
            task("A", Concat, "src/missing.js", "dist/a.js"),
            task("B", Concat, "dist/a.js", "dist/b.js"),
            task("G", Concat, "src/*.ts", "dist/g.js"),
        ],
        &fs,
        ProviderSet::builtin(""),
    );

    let report = scheduler.run_full().await;

    match report.status_of("A") {
        Some(TaskStatus::Failed(PipelineError::DanglingInput { task, input })) => {
            assert_eq!(task, "A");
            assert_eq!(input, "src/missing.js");
        }
        other => panic!("expected DanglingInput, got {other:?}"),
    }
    assert!(matches!(
        report.status_of("G"),
        Some(TaskStatus::Failed(PipelineError::DanglingInput { .. }))
    ));
    assert!(report.status_of("B").is_some_and(|s| s.is_skipped()));
    Ok(())
}

#[tokio::test]
async fn deleted_source_fails_its_task_and_keeps_old_output() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "a"), ("src/b.js", "b")]);
    let mut providers = ProviderSet::builtin("");
    providers.register(FakeProvider::new(ScriptMinify));
    let mut scheduler = scheduler_on(script_pipeline(), &fs, providers);
    assert!(scheduler.run_full().await.success());

    fs.remove_file("src/a.js");
    let report = scheduler.run_subset(&paths(&["src/a.js"])).await;

    assert_eq!(report.failed_tasks(), vec!["concat"]);
    assert_eq!(report.skipped_tasks(), vec!["minify"]);
    assert_eq!(read_str(&fs, "dist/base.js").as_deref(), Some("a\nb"));
    Ok(())
}

#[tokio::test]
async fn glob_inputs_expand_sorted_and_skip_nested_dirs() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[
        ("src/b.js", "B"),
        ("src/a.js", "A"),
        ("src/sub/c.js", "C"),
        ("src/readme.md", "docs"),
    ]);
    let concat = FakeProvider::new(Concat);
    let mut providers = ProviderSet::new();
    providers.register(concat.clone());

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::concat("flat")
                .input("src/a.js")
                .input("src/*.js")
                .output("dist/flat.js")
                .build(),
            TaskBuilder::concat("deep")
                .input("src/**/*.js")
                .output("dist/deep.js")
                .build(),
        ],
        &fs,
        providers,
    );

    assert!(scheduler.run_full().await.success());
    let calls = concat.calls();
    assert_eq!(calls[0], vec!["src/a.js", "src/b.js"]);
    assert_eq!(calls[1], vec!["src/a.js", "src/b.js", "src/sub/c.js"]);
    Ok(())
}

#[tokio::test]
async fn glob_inputs_see_producer_outputs_from_the_same_run() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/x.js", "X"), ("dist/parts/manual.js", "M")]);
    let concat = FakeProvider::new(Concat);
    let mut providers = ProviderSet::new();
    providers.register(concat.clone());

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::concat("bundle")
                .input("dist/parts/*.js")
                .output("dist/bundle.js")
                .build(),
            task("x", Concat, "src/x.js", "dist/parts/x.js"),
        ],
        &fs,
        providers,
    );

    let report = scheduler.run_full().await;
    assert_eq!(report.executed(), vec!["x", "bundle"]);
    assert_eq!(
        concat.calls()[1],
        vec!["dist/parts/manual.js", "dist/parts/x.js"]
    );
    Ok(())
}

#[tokio::test]
async fn missing_provider_is_a_transform_failure() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "a")]);
    let mut scheduler = scheduler_on(
        vec![task("min", ScriptMinify, "src/a.js", "dist/a.min.js")],
        &fs,
        ProviderSet::new(),
    );

    let report = scheduler.run_full().await;
    match report.status_of("min") {
        Some(TaskStatus::Failed(err @ PipelineError::Transform { .. })) => {
            assert!(err.to_string().contains("no provider registered"));
        }
        other => panic!("expected Transform failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn filter_unchanged_drops_identical_content() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.js", "a"), ("src/b.js", "b")]);
    let mut providers = ProviderSet::builtin("");
    providers.register(FakeProvider::new(ScriptMinify));
    let mut scheduler = scheduler_on(script_pipeline(), &fs, providers);
    scheduler.run_full().await;

    let changed = paths(&["src/a.js", "src/never-read.js"]);
    assert_eq!(scheduler.filter_unchanged(&changed), paths(&["src/never-read.js"]));

    fs.add_file("src/a.js", "a, edited");
    assert_eq!(scheduler.filter_unchanged(&changed), changed);
    Ok(())
}

#[tokio::test]
async fn negated_inputs_are_subtracted_from_their_globs() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[
        ("dist/b.css", "B"),
        ("dist/a.css", "A"),
        ("dist/a.min.css", "old"),
    ]);
    let concat = FakeProvider::new(Concat);
    let mut providers = ProviderSet::new();
    providers.register(concat.clone());

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::concat("bundle")
                .input("dist/*.css")
                .input("!dist/*.min.css")
                .output("dist/all.txt")
                .build(),
            TaskBuilder::concat("minified")
                .input("dist/*.min.css")
                .input("!dist/a.*")
                .output("dist/minified.txt")
                .build(),
        ],
        &fs,
        providers,
    );

    let report = scheduler.run_full().await;

    assert_eq!(concat.calls(), vec![vec!["dist/a.css", "dist/b.css"]]);
    match report.status_of("minified") {
        Some(TaskStatus::Failed(PipelineError::DanglingInput { input, .. })) => {
            assert_eq!(input, "dist/*.min.css");
        }
        other => panic!("expected DanglingInput, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn mapped_task_writes_one_artifact_per_input() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[
        ("dist/a.css", "A"),
        ("dist/b.css", "B"),
        ("dist/b.min.css", "stale"),
        ("src/site.scss", "S"),
    ]);
    let minifier = FakeProvider::new(StyleMinify);
    let mut providers = ProviderSet::new();
    providers.register(minifier.clone());
    providers.register(FakeProvider::new(StyleCompile));

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::style_minify("cssmin")
                .input("dist/*.css")
                .input("!dist/*.min.css")
                .each("dist", "static/css", ".min.css")
                .build(),
            TaskBuilder::style_compile("compile")
                .input("src/site.scss")
                .output("dist/site.css")
                .build(),
        ],
        &fs,
        providers,
    );

    let report = scheduler.run_full().await;
    assert!(report.success(), "{}", report.render());
    assert_eq!(report.executed(), vec!["compile", "cssmin"]);
    assert_eq!(
        minifier.calls(),
        vec![vec!["dist/a.css"], vec!["dist/b.css"], vec!["dist/site.css"]]
    );

    let minified = [
        "static/css/a.min.css",
        "static/css/b.min.css",
        "static/css/site.min.css",
    ];
    assert!(matches!(
        report.status_of("cssmin"),
        Some(TaskStatus::Succeeded { outputs, written })
            if outputs == &minified && written == &minified
    ));
    assert_eq!(report.changed_outputs[0], "dist/site.css");
    assert_eq!(report.changed_outputs[1..], minified);
    assert_eq!(
        read_str(&fs, "static/css/a.min.css"),
        Some(FakeProvider::expected_output(StyleMinify, &["A"]))
    );
    assert_eq!(
        read_str(&fs, "static/css/site.min.css"),
        Some(FakeProvider::expected_output(
            StyleMinify,
            &[FakeProvider::expected_output(StyleCompile, &["S"]).as_str()]
        ))
    );
    assert_eq!(read_str(&fs, "dist/b.min.css").as_deref(), Some("stale"));
    assert_eq!(scheduler.cache().producer_of("static/css/b.min.css"), Some("cssmin"));

    // One edited stylesheet rewrites only its own artifact.
    fs.add_file("dist/b.css", "B2");
    let report = scheduler.run_subset(&paths(&["dist/b.css"])).await;
    assert_eq!(report.executed(), vec!["cssmin"]);
    assert_eq!(report.changed_outputs, vec!["static/css/b.min.css"]);
    assert_eq!(fs.write_count("static/css/a.min.css"), 1);
    assert_eq!(fs.write_count("static/css/b.min.css"), 2);
    Ok(())
}

#[tokio::test]
async fn mapped_task_writes_nothing_when_one_input_fails() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("dist/a.css", "A"), ("dist/b.css", "BROKEN")]);
    let mut providers = ProviderSet::new();
    providers.register(FakeProvider::new(StyleMinify).failing_on("BROKEN"));

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::style_minify("cssmin")
                .input("dist/*.css")
                .each("dist", "static/css", ".min.css")
                .build(),
        ],
        &fs,
        providers,
    );

    let report = scheduler.run_full().await;

    assert_eq!(report.failed_tasks(), vec!["cssmin"]);
    assert_eq!(read_str(&fs, "static/css/a.min.css"), None);
    assert!(report.changed_outputs.is_empty());
    Ok(())
}

#[tokio::test]
async fn in_place_mapping_never_reads_its_own_outputs() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("dist/a.css", "A")]);
    let minifier = FakeProvider::new(StyleMinify);
    let mut providers = ProviderSet::new();
    providers.register(minifier.clone());

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::style_minify("cssmin")
                .input("dist/*.css")
                .each("dist", "dist", ".min.css")
                .build(),
        ],
        &fs,
        providers,
    );

    assert!(scheduler.run_full().await.success());
    let second = scheduler.run_full().await;

    assert!(second.success());
    assert_eq!(minifier.calls(), vec![vec!["dist/a.css"], vec!["dist/a.css"]]);
    assert!(second.changed_outputs.is_empty());
    assert_eq!(fs.write_count("dist/a.min.css"), 1);
    Ok(())
}

#[tokio::test]
async fn mapped_input_outside_its_base_fails_the_task() -> TestResult {
    init_tracing();

    let fs = mock_fs_with(&[("src/a.css", "A")]);
    let mut providers = ProviderSet::new();
    providers.register(FakeProvider::new(StyleMinify));

    let mut scheduler = scheduler_on(
        vec![
            TaskBuilder::style_minify("cssmin")
                .input("src/a.css")
                .each("styles", "static/css", ".min.css")
                .build(),
        ],
        &fs,
        providers,
    );

    let report = scheduler.run_full().await;
    match report.status_of("cssmin") {
        Some(TaskStatus::Failed(err @ PipelineError::Transform { .. })) => {
            assert!(format!("{err:#}").contains("not a file under 'styles'"), "{err:#}");
        }
        other => panic!("expected Transform failure, got {other:?}"),
    }
    Ok(())
}
