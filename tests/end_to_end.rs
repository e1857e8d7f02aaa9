// tests/end_to_end.rs

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use spabuild::config::ConfigFile;
use spabuild::dag::{Scheduler, TaskRunState};
use spabuild::engine::{Generation, RunReport, TaskGraphRunner};
use spabuild::errors::{BuildError, SpabuildError};
use spabuild::exec::{ActionExecutor, BuildActions};
use spabuild::fs::RealFileSystem;
use spabuild::pipeline::ModuleGraphCache;
use spabuild::report::{ErrorReporter, ReportMode};
use spabuild::types::BuildVariant;
use spabuild_test_utils::builders::ConfigFileBuilder;
use spabuild_test_utils::{init_tracing, with_timeout};

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn sample_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "js/app.js",
        "// entry\nconst React = require('react');\nconst greet = require('./greet');\nmodule.exports = greet(process.env.NODE_ENV);\n",
    );
    write(
        root,
        "js/greet.js",
        "module.exports = function (env) {\n  return 'hello ' + env + ' ' + process.env.API_URL;\n};\n",
    );
    write(root, "sass/main.scss", "$pad: 4px;\n.app {\n  .title { padding: $pad; }\n}\n");
    write(
        root,
        "index-template.html",
        "<link href=\"{{ stylesheet }}\"><script src=\"{{ script }}\"></script><!-- {{ environment }} -->\n",
    );
    dir
}

fn config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_external("react")
        .with_env(BuildVariant::Production, "API_URL", "/api")
        .with_env(BuildVariant::Development, "API_URL", "http://localhost:3000")
        .build()
}

async fn run(
    cfg: &ConfigFile,
    root: &Path,
    variant: BuildVariant,
    target: &str,
) -> (RunReport, Arc<ErrorReporter>) {
    let generation = Generation::new();
    let actions = BuildActions::from_config(
        cfg,
        root,
        variant,
        Arc::new(RealFileSystem),
        Arc::new(ModuleGraphCache::new()),
        generation.clone(),
    )
    .unwrap();
    let reporter = Arc::new(ErrorReporter::new(ReportMode::OneShot));
    let (tx, rx) = mpsc::channel(64);
    let executor = ActionExecutor::new(Arc::new(actions), Arc::clone(&reporter), tx);
    let mut runner = TaskGraphRunner::new(Scheduler::from_config(cfg, variant), rx, executor, generation);

    let report = with_timeout(runner.run_target(target)).await.unwrap();
    (report, reporter)
}

#[tokio::test]
async fn production_build_writes_every_artifact() {
    init_tracing();
    let dir = sample_project();
    let root = dir.path();
    let cfg = config();

    let (report, reporter) = run(&cfg, root, BuildVariant::Production, "production").await;

    assert!(report.is_success(), "{:?}", report.outcomes);
    reporter.terminal_result(&report).unwrap();

    let bundle = fs::read_to_string(root.join("lib/bundle.min.js")).unwrap();
    assert!(bundle.contains(r#"greet("production")"#));
    assert!(bundle.contains(r#""/api""#));
    assert!(!bundle.contains("// entry"));
    assert!(!bundle.contains("sourceMappingURL"));
    assert!(!root.join("lib/bundle.min.js.map").exists());
    assert!(!root.join("lib/bundle.js").exists());

    let css = fs::read_to_string(root.join("css/main.css")).unwrap();
    assert!(css.contains(".app .title{padding:4px}"), "{css}");

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert!(html.contains(r#"<script src="lib/bundle.min.js"></script>"#));
    assert!(html.contains("<!-- dist -->"));
}

#[tokio::test]
async fn development_build_emits_a_source_map() {
    init_tracing();
    let dir = sample_project();
    let root = dir.path();
    let cfg = config();

    let (report, _) = run(&cfg, root, BuildVariant::Development, "development").await;
    assert!(report.is_success(), "{:?}", report.outcomes);

    let bundle = fs::read_to_string(root.join("lib/bundle.js")).unwrap();
    assert!(bundle.contains("// entry"));
    assert!(bundle.contains(r#""http://localhost:3000""#));
    assert!(bundle.ends_with("//# sourceMappingURL=bundle.js.map\n"));

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.join("lib/bundle.js.map")).unwrap()).unwrap();
    assert_eq!(map["version"], 3);
    assert_eq!(map["file"], "bundle.js");
    assert_eq!(map["sources"], serde_json::json!(["js/greet.js", "js/app.js"]));

    let css = fs::read_to_string(root.join("css/main.css")).unwrap();
    assert!(css.contains("padding: 4px;"));

    let html = fs::read_to_string(root.join("index.html")).unwrap();
    assert!(html.contains("<!-- dev -->"));
}

#[tokio::test]
async fn lint_failure_fails_the_build_but_not_unrelated_tasks() {
    init_tracing();
    let dir = sample_project();
    let root = dir.path();
    write(root, "js/greet.js", "module.exports = function () {\n  debugger;\n};\n");
    let cfg = config();

    let (report, reporter) = run(&cfg, root, BuildVariant::Production, "production").await;

    assert!(matches!(report.outcome_of("lint"), Some(TaskRunState::Failed { .. })));
    assert!(matches!(report.outcome_of("js-bundle"), Some(TaskRunState::Skipped { .. })));
    assert_eq!(report.outcome_of("stylesheet"), Some(&TaskRunState::Success));
    assert_eq!(report.outcome_of("markup"), Some(&TaskRunState::Success));
    assert!(!root.join("lib/bundle.min.js").exists());
    assert!(root.join("css/main.css").exists());

    let err = reporter.terminal_result(&report).unwrap_err();
    match err {
        SpabuildError::Build(BuildError::Lint { problems }) => {
            assert_eq!(problems.len(), 1);
            assert!(problems[0].starts_with("js/greet.js:2:"), "{problems:?}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn clean_removes_what_builds_produced() {
    init_tracing();
    let dir = sample_project();
    let root = dir.path();
    let cfg = config();

    let (report, _) = run(&cfg, root, BuildVariant::Development, "development").await;
    assert!(report.is_success());
    assert!(root.join("lib/bundle.js.map").exists());

    let (report, _) = run(&cfg, root, BuildVariant::Production, "clean").await;
    assert!(report.is_success());
    for artifact in ["lib/bundle.js", "lib/bundle.js.map", "css/main.css", "index.html"] {
        assert!(!root.join(artifact).exists(), "{artifact} survived clean");
    }
    assert!(root.join("js/app.js").exists());
}
