#![allow(dead_code)]

use std::fs;
use std::path::Path;

use assetdag::dag::Task;
use assetdag::transform::ProviderKind;
use assetdag_test_utils::builders::TaskBuilder;

/// Write `(relative path, content)` pairs below `root`, creating directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create fixture dir");
        }
        fs::write(&path, content).expect("write fixture file");
    }
}

/// The two-step script pipeline used across tests:
/// `concat` joins `src/a.js` and `src/b.js` into `dist/base.js`, and
/// `minify` turns that into `dist/base.min.js`.
pub fn script_pipeline() -> Vec<Task> {
    vec![
        TaskBuilder::concat("concat")
            .input("src/a.js")
            .input("src/b.js")
            .output("dist/base.js")
            .build(),
        TaskBuilder::script_minify("minify")
            .input("dist/base.js")
            .output("dist/base.min.js")
            .build(),
    ]
}

/// A task of `kind` reading `input` and writing `output`.
pub fn task(name: &str, kind: ProviderKind, input: &str, output: &str) -> Task {
    let builder = match kind {
        ProviderKind::Concat => TaskBuilder::concat(name),
        ProviderKind::ScriptMinify => TaskBuilder::script_minify(name),
        ProviderKind::StyleCompile => TaskBuilder::style_compile(name),
        ProviderKind::StyleMinify => TaskBuilder::style_minify(name),
    };
    builder.input(input).output(output).build()
}
