// tests/runner_fake_executor.rs

use std::collections::BTreeSet;

use spabuild::config::ConfigFile;
use spabuild::dag::TaskRunState;
use spabuild::errors::SpabuildError;
use spabuild::types::{BuildVariant, TaskAction};
use spabuild_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use spabuild_test_utils::fake_executor::fake_runner;
use spabuild_test_utils::{init_tracing, with_timeout};

fn default_config() -> ConfigFile {
    ConfigFileBuilder::new().build()
}

fn skipped_by(task: &str) -> TaskRunState {
    TaskRunState::Skipped {
        reason: format!("upstream failure of {task}"),
    }
}

#[tokio::test]
async fn production_runs_every_task_once_in_dependency_order() {
    init_tracing();
    let cfg = default_config();
    let (mut runner, executor) = fake_runner(&cfg, BuildVariant::Production);

    let report = with_timeout(runner.run_target("production")).await.unwrap();

    assert!(report.is_success());
    let executed = executor.executed().lock().unwrap().clone();
    assert_eq!(executed.len(), 5);

    let pos = |name: &str| executed.iter().position(|t| t == name).unwrap();
    assert!(pos("lint") < pos("js-bundle"));
    assert!(pos("js-bundle") < pos("production"));
    assert!(pos("markup") < pos("production"));
    assert!(pos("stylesheet") < pos("production"));
    assert!(!executed.contains(&"clean".to_string()));
}

#[tokio::test]
async fn lint_failure_only_blocks_its_dependents() {
    init_tracing();
    let cfg = default_config();
    let (mut runner, executor) = fake_runner(&cfg, BuildVariant::Production);
    executor.failing().lock().unwrap().insert("lint".to_string());

    let report = with_timeout(runner.run_target("production")).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(
        report.outcome_of("lint"),
        Some(&TaskRunState::Failed {
            error: "lint failed".to_string()
        })
    );
    assert_eq!(report.outcome_of("js-bundle"), Some(&skipped_by("lint")));
    assert_eq!(report.outcome_of("production"), Some(&skipped_by("lint")));
    assert_eq!(report.outcome_of("markup"), Some(&TaskRunState::Success));
    assert_eq!(report.outcome_of("stylesheet"), Some(&TaskRunState::Success));

    let executed = executor.executed().lock().unwrap().clone();
    assert!(!executed.contains(&"js-bundle".to_string()));
}

#[tokio::test]
async fn unrelated_failure_leaves_other_branches_alone() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_task("lint", TaskConfigBuilder::new(TaskAction::Lint).build())
        .with_task(
            "js-bundle",
            TaskConfigBuilder::new(TaskAction::JsBundle).after("lint").build(),
        )
        .with_task("stylesheet", TaskConfigBuilder::new(TaskAction::Stylesheet).build())
        .with_task(
            "development",
            TaskConfigBuilder::group()
                .after("js-bundle")
                .after("stylesheet")
                .build(),
        )
        .build();
    let (mut runner, executor) = fake_runner(&cfg, BuildVariant::Development);
    executor.failing().lock().unwrap().insert("stylesheet".to_string());

    let report = with_timeout(runner.run_target("development")).await.unwrap();

    assert_eq!(report.outcome_of("lint"), Some(&TaskRunState::Success));
    assert_eq!(report.outcome_of("js-bundle"), Some(&TaskRunState::Success));
    assert_eq!(report.outcome_of("development"), Some(&skipped_by("stylesheet")));
    assert_eq!(report.unsuccessful(), vec!["development", "stylesheet"]);
}

#[tokio::test]
async fn partial_rerun_relies_on_previous_outcomes() {
    init_tracing();
    let cfg = default_config();
    let (mut runner, executor) = fake_runner(&cfg, BuildVariant::Development);

    let first = with_timeout(runner.run_target("development")).await.unwrap();
    assert!(first.is_success());
    executor.executed().lock().unwrap().clear();

    // js-bundle alone: lint is outside the run but succeeded before.
    let tasks: BTreeSet<String> = ["js-bundle".to_string()].into();
    let second = with_timeout(runner.run(&tasks)).await.unwrap();

    assert!(second.is_success());
    assert!(second.run_id > first.run_id);
    assert_eq!(
        executor.executed().lock().unwrap().clone(),
        vec!["js-bundle".to_string()]
    );
}

#[tokio::test]
async fn dependency_that_never_succeeded_skips_the_task() {
    init_tracing();
    let cfg = default_config();
    let (mut runner, executor) = fake_runner(&cfg, BuildVariant::Development);

    let tasks: BTreeSet<String> = ["js-bundle".to_string()].into();
    let report = with_timeout(runner.run(&tasks)).await.unwrap();

    assert_eq!(report.outcome_of("js-bundle"), Some(&skipped_by("lint")));
    assert!(executor.executed().lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_target_is_rejected() {
    let cfg = default_config();
    let (mut runner, _executor) = fake_runner(&cfg, BuildVariant::Production);

    let err = runner.run_target("deploy").await.unwrap_err();
    assert!(matches!(err, SpabuildError::TaskNotFound(name) if name == "deploy"));
}
