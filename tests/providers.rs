// tests/providers.rs

mod common;
use crate::common::write_files;

use std::error::Error;

use assetdag::transform::{
    Artifact, ConcatOptions, Concatenator, ProviderKind, ProviderSet, ScriptMinifier,
    ScriptMinifyOptions, StyleCompileOptions, StyleCompiler, StyleMinifier, StyleMinifyOptions,
    StyleOutput, TransformOptions, TransformProvider,
};
use assetdag::transform::script::minifier_args;
use assetdag_test_utils::init_tracing;
use tempfile::tempdir;

type TestResult = Result<(), Box<dyn Error>>;

fn artifact(path: &str, content: &str) -> Artifact {
    Artifact::new(path, content.as_bytes().to_vec())
}

fn text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).expect("utf-8 output")
}

#[tokio::test]
async fn concat_joins_in_order_with_separator_and_banner() -> TestResult {
    let inputs = [artifact("a.js", "var a;"), artifact("b.js", "var b;")];

    let plain = Concatenator
        .transform(&inputs, &TransformOptions::Concat(ConcatOptions::default()))
        .await?;
    assert_eq!(text(plain), "var a;\nvar b;");

    let custom = TransformOptions::Concat(ConcatOptions {
        separator: ";\n".to_string(),
        banner: Some("/* built */\n".to_string()),
    });
    let out = Concatenator.transform(&inputs, &custom).await?;
    assert_eq!(text(out), "/* built */\nvar a;;\nvar b;");
    Ok(())
}

#[tokio::test]
async fn style_minifier_compresses_valid_css() -> TestResult {
    let inputs = [artifact("site.css", "a {\n  color: red;\n}\n")];
    let out = StyleMinifier
        .transform(&inputs, &TransformOptions::StyleMinify(StyleMinifyOptions {}))
        .await?;
    assert_eq!(text(out).trim(), "a{color:red}");
    Ok(())
}

#[tokio::test]
async fn style_minifier_rejects_malformed_css() {
    init_tracing();

    let inputs = [artifact("site.css", "a { color: red;")];
    let result = StyleMinifier
        .transform(&inputs, &TransformOptions::StyleMinify(StyleMinifyOptions {}))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn style_compiler_resolves_variables_and_imports() -> TestResult {
    init_tracing();

    let dir = tempdir()?;
    write_files(
        dir.path(),
        &[
            ("styles/_vars.scss", "$accent: red;\n"),
            ("styles/partials/_mixins.scss", "@mixin bold { font-weight: bold; }\n"),
        ],
    );

    let compiler = StyleCompiler::new(dir.path());
    let inputs = [artifact(
        "styles/main.scss",
        "@import 'vars';\n@import 'mixins';\na { color: $accent; @include bold; }\n",
    )];
    let options = TransformOptions::StyleCompile(StyleCompileOptions {
        output_style: StyleOutput::Compressed,
        load_paths: vec!["styles/partials".to_string()],
    });

    let out = compiler.transform(&inputs, &options).await?;
    assert_eq!(text(out).trim(), "a{color:red;font-weight:bold}");
    Ok(())
}

#[tokio::test]
async fn style_compiler_reports_undefined_variables() -> TestResult {
    let dir = tempdir()?;
    let compiler = StyleCompiler::new(dir.path());
    let inputs = [artifact("main.scss", "a { color: $missing; }")];

    let err = compiler
        .transform(&inputs, &TransformOptions::defaults_for(ProviderKind::StyleCompile))
        .await
        .expect_err("undefined variable");
    assert!(err.to_string().contains("Undefined variable"), "{err}");
    Ok(())
}

#[test]
fn minifier_flags_follow_options() {
    let defaults = minifier_args(&ScriptMinifyOptions::default());
    assert_eq!(
        defaults,
        vec![
            "--loader=js",
            "--log-level=error",
            "--minify-whitespace",
            "--minify-identifiers",
            "--minify-syntax",
        ]
    );

    let gentle = minifier_args(&ScriptMinifyOptions {
        preserve_identifier_names: true,
        apply_compression: false,
        emit_readable_output: true,
        ..ScriptMinifyOptions::default()
    });
    assert_eq!(gentle, vec!["--loader=js", "--log-level=error"]);
}

#[tokio::test]
async fn missing_minifier_binary_is_a_spawn_error() {
    init_tracing();

    let options = TransformOptions::ScriptMinify(ScriptMinifyOptions {
        command: "assetdag-no-such-minifier".to_string(),
        ..ScriptMinifyOptions::default()
    });
    let err = ScriptMinifier
        .transform(&[artifact("a.js", "var a;")], &options)
        .await
        .expect_err("binary does not exist");
    assert!(format!("{err:#}").contains("spawning script minifier"));
}

#[cfg(unix)]
#[tokio::test]
async fn minifier_exit_status_is_checked() {
    let options = TransformOptions::ScriptMinify(ScriptMinifyOptions {
        command: "false".to_string(),
        ..ScriptMinifyOptions::default()
    });
    let err = ScriptMinifier
        .transform(&[artifact("a.js", "var a;")], &options)
        .await
        .expect_err("`false` exits non-zero");
    assert!(err.to_string().contains("exited with"));
}

#[tokio::test]
async fn provider_rejects_options_of_another_kind() {
    let result = Concatenator
        .transform(
            &[artifact("a.js", "x")],
            &TransformOptions::defaults_for(ProviderKind::StyleMinify),
        )
        .await;
    let err = result.expect_err("mismatched options");
    assert!(err.to_string().contains("received options for 'style-minify'"));
}

#[test]
fn options_decode_from_tables_with_defaults() -> TestResult {
    let mut table = toml::Table::new();
    table.insert("banner".into(), toml::Value::String("/*!*/".into()));

    match TransformOptions::from_table(ProviderKind::Concat, Some(table))? {
        TransformOptions::Concat(opts) => {
            assert_eq!(opts.banner.as_deref(), Some("/*!*/"));
            assert_eq!(opts.separator, "\n");
        }
        other => panic!("expected concat options, got {other:?}"),
    }

    assert_eq!(
        TransformOptions::from_table(ProviderKind::ScriptMinify, None)?,
        TransformOptions::ScriptMinify(ScriptMinifyOptions::default())
    );

    let mut bad = toml::Table::new();
    bad.insert("minify".into(), toml::Value::Boolean(true));
    assert!(TransformOptions::from_table(ProviderKind::StyleMinify, Some(bad)).is_err());
    Ok(())
}

#[test]
fn provider_names_round_trip_through_display() {
    for kind in [
        ProviderKind::Concat,
        ProviderKind::ScriptMinify,
        ProviderKind::StyleCompile,
        ProviderKind::StyleMinify,
    ] {
        assert_eq!(kind.to_string().parse::<ProviderKind>(), Ok(kind));
    }
    assert!("uglify".parse::<ProviderKind>().is_err());
}

#[test]
fn builtin_set_covers_every_provider() {
    let set = ProviderSet::builtin(".");
    for kind in [
        ProviderKind::Concat,
        ProviderKind::ScriptMinify,
        ProviderKind::StyleCompile,
        ProviderKind::StyleMinify,
    ] {
        assert_eq!(set.get(kind).map(|p| p.kind()), Some(kind));
    }
    assert!(ProviderSet::new().get(ProviderKind::Concat).is_none());
}
