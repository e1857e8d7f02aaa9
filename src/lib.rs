// src/lib.rs

pub mod bundle;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod tools;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::{config_root_dir, default_config_path, load_and_validate};
use crate::config::model::ConfigFile;
use crate::config::validate::WATCH_ENTRY;
use crate::dag::{Scheduler, TaskGraph};
use crate::engine::{Generation, RunReport, RunnerEvent, TaskGraphRunner};
use crate::errors::{Result, SpabuildError};
use crate::exec::{ActionExecutor, BuildActions};
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::ModuleGraphCache;
use crate::report::{ErrorReporter, ReportMode};
use crate::types::BuildVariant;
use crate::watch::{ProjectClassifier, RunnerRebuilder, WatchScheduler, spawn_watcher};

/// Environment variable selecting the variant for entries that do not pin one.
pub const VARIANT_ENV: &str = "SPABUILD_ENV";

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and variant selection
/// - pipeline, actions and executor
/// - scheduler and runner
/// - (for `watch`) the file watcher, rebuild loop and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;

    let root = config_root_dir(&config_path);
    let root = root.canonicalize().unwrap_or(root);

    // Read exactly once per invocation.
    let env_selector = std::env::var(VARIANT_ENV).ok();
    let variant = BuildVariant::for_entry(
        &args.task,
        args.variant.map(BuildVariant::from),
        env_selector.as_deref(),
    )
    .map_err(SpabuildError::ConfigError)?;

    if args.task != WATCH_ENTRY && !cfg.tasks().contains_key(&args.task) {
        return Err(SpabuildError::TaskNotFound(args.task));
    }

    if args.dry_run {
        print_dry_run(&cfg, &args.task, variant, &root);
        return Ok(());
    }

    if args.task == WATCH_ENTRY {
        run_watch(&cfg, &root, variant).await
    } else {
        run_once(&cfg, &root, variant, &args.task).await
    }
}

/// Everything one invocation needs to run tasks.
struct Session {
    runner: TaskGraphRunner<ActionExecutor>,
    actions: Arc<BuildActions>,
    reporter: Arc<ErrorReporter>,
}

fn build_session(
    cfg: &ConfigFile,
    root: &Path,
    variant: BuildVariant,
    mode: ReportMode,
) -> Result<Session> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let cache = Arc::new(ModuleGraphCache::new());
    let generation = Generation::new();

    let actions = Arc::new(BuildActions::from_config(
        cfg,
        root,
        variant,
        fs,
        cache,
        generation.clone(),
    )?);
    let reporter = Arc::new(ErrorReporter::new(mode));

    let (event_tx, event_rx) = mpsc::channel::<RunnerEvent>(64);
    let executor = ActionExecutor::new(Arc::clone(&actions), Arc::clone(&reporter), event_tx);
    let runner = TaskGraphRunner::new(
        Scheduler::from_config(cfg, variant),
        event_rx,
        executor,
        generation,
    );

    Ok(Session {
        runner,
        actions,
        reporter,
    })
}

async fn run_once(cfg: &ConfigFile, root: &Path, variant: BuildVariant, target: &str) -> Result<()> {
    let Session {
        mut runner,
        reporter,
        ..
    } = build_session(cfg, root, variant, ReportMode::OneShot)?;

    info!(target = %target, %variant, root = ?root, "build started");
    let report = runner.run_target(target).await?;
    print_summary(&report);

    reporter.terminal_result(&report)
}

async fn run_watch(cfg: &ConfigFile, root: &Path, variant: BuildVariant) -> Result<()> {
    let Session {
        mut runner,
        actions,
        reporter,
    } = build_session(cfg, root, variant, ReportMode::Watch)?;

    let target = cfg.watch().target.clone();
    info!(target = %target, %variant, root = ?root, "initial build");
    let report = runner.run_target(&target).await?;
    print_summary(&report);

    let scope = runner.scheduler().graph().upstream_closure(&target);
    let runner = Arc::new(Mutex::new(runner));
    let rebuilder = Arc::new(RunnerRebuilder::new(runner, scope));
    let classifier = Arc::new(ProjectClassifier::from_config(
        cfg,
        Some(Arc::clone(actions.pipeline())),
    )?);

    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    let _watcher = spawn_watcher(root, changes_tx)?;

    let scheduler = WatchScheduler::new(
        classifier,
        rebuilder,
        reporter,
        Duration::from_millis(cfg.watch().debounce_ms),
    );

    tokio::select! {
        summary = scheduler.run(changes_rx) => {
            warn!(rebuilds = summary.rebuilds, "watcher stopped");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            info!("shutdown requested");
        }
    }

    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("spabuild run {} ({})", report.run_id, report.variant);
    for (task, state) in &report.outcomes {
        println!("  {task}: {state}");
    }
}

/// Print tasks, variant and artifact paths without executing anything.
fn print_dry_run(cfg: &ConfigFile, entry: &str, variant: BuildVariant, root: &Path) {
    let graph = TaskGraph::from_config(cfg, variant);
    let target = if entry == WATCH_ENTRY {
        cfg.watch().target.as_str()
    } else {
        entry
    };
    let selected = graph.upstream_closure(target);

    println!("spabuild dry-run");
    println!("  root    = {}", root.display());
    println!("  entry   = {entry}");
    println!("  variant = {variant}");
    println!();

    println!("tasks ({}):", graph.tasks().len());
    for name in graph.tasks() {
        let marker = if selected.contains(name) { "*" } else { " " };
        let action = graph
            .action_of(name)
            .map(|a| a.to_string())
            .unwrap_or_default();
        println!("  {marker} {name} [{action}]");
        let deps = graph.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }
    println!();

    let script = cfg.script();
    println!("artifacts:");
    println!("  script     = {}", script.output_for(variant));
    if script.source_map && !variant.is_production() {
        println!("  script map = {}.map", script.output_for(variant));
    }
    println!("  stylesheet = {}", cfg.stylesheet().output);
    println!("  markup     = {}", cfg.markup().output);

    debug!("dry-run complete (no execution)");
}
