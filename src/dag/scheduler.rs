// src/dag/scheduler.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, info, warn};

use crate::config::model::ConfigFile;
use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{DepStatus, ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, TaskInfo, TaskRunState};
use crate::engine::{TaskName, TaskOutcome};
use crate::types::BuildVariant;

/// Scheduler holds the immutable task graph plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - deciding when a task is ready to run (deps satisfied)
/// - recording success / failure
/// - skipping dependents of failed tasks
///
/// It performs no I/O; the runner drives it with completions.
#[derive(Debug)]
pub struct Scheduler {
    graph: TaskGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    pub fn new(graph: TaskGraph) -> Self {
        let tasks = graph
            .tasks()
            .into_iter()
            .filter_map(|name| {
                let action = graph.action_of(name)?;
                let deps = graph.dependencies_of(name).to_vec();
                Some((name.to_string(), TaskInfo::new(name.to_string(), action, deps)))
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Construct a scheduler from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile, variant: BuildVariant) -> Self {
        Self::new(TaskGraph::from_config(cfg, variant))
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// ID of the most recently started run.
    pub fn last_run_id(&self) -> u64 {
        self.run_counter
    }

    /// Read-only view of the given task's run state.
    pub fn run_state_of(&self, task: &str) -> Option<TaskRunState> {
        let info = self.tasks.get(task)?;
        Some(info.run_state.as_ref().into())
    }

    /// State of every task that took part in the latest run.
    pub fn outcomes(&self) -> BTreeMap<TaskName, TaskRunState> {
        self.tasks
            .values()
            .filter(|info| info.run_state.is_some())
            .map(|info| (info.name.clone(), info.run_state.as_ref().into()))
            .collect()
    }

    /// Whether the dependencies of `task` are satisfied for the current run.
    ///
    /// Returns `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        let mgr = ReadOnlyStateManager::new(&self.tasks);
        Some(mgr.dep_status(info) == DepStatus::Satisfied)
    }

    /// Start a new run over exactly `tasks`, keeping historical outcomes for
    /// dependencies outside the set.
    ///
    /// An active run is abandoned; completions still carrying its id are
    /// ignored by the runner.
    pub fn start_run(&mut self, tasks: &BTreeSet<TaskName>) -> SchedulerStep {
        if let Some(old) = self.current_run_id {
            warn!(run_id = old, "starting a new run while one is active; abandoning it");
        }

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        info!(run_id = self.run_counter, tasks = ?tasks, "scheduler: starting run");

        let mut manager = StateManager::new(&mut self.tasks, self.current_run_id);
        manager.mark_pending(tasks.iter());
        let newly_skipped = manager.skip_blocked();
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_just_finished,
        }
    }

    /// Record the completion of `task` and advance the run.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task = %task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        if info.run_state != Some(RunState::Running) {
            warn!(task = %task, run_id, state = ?info.run_state, "completion for task that is not running; ignoring");
            return SchedulerStep::default();
        }

        match outcome {
            TaskOutcome::Success => {
                info.run_state = Some(RunState::Succeeded);
                info.last_successful_run = Some(run_id);
                debug!(task = %info.name, run_id, "task completed successfully");
            }
            TaskOutcome::Failed(error) => {
                warn!(
                    task = %info.name,
                    run_id,
                    error = %error,
                    "task failed; skipping dependents in this run"
                );
                info.run_state = Some(RunState::Failed(error));
                info.last_failed_run = Some(run_id);
            }
        }

        let mut manager = StateManager::new(&mut self.tasks, self.current_run_id);
        let newly_skipped = manager.skip_blocked();
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_just_finished,
        }
    }

    /// Clear `current_run_id` once every task is terminal.
    ///
    /// Returns `true` if this call transitioned the scheduler to idle.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&mut self.tasks, self.current_run_id);
        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskAction;

    fn scheduler() -> Scheduler {
        let t = |n: &str, a, deps: &[&str]| {
            (
                n.to_string(),
                a,
                deps.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            )
        };
        Scheduler::new(TaskGraph::from_tasks(
            BuildVariant::Production,
            [
                t("lint", TaskAction::Lint, &[]),
                t("js-bundle", TaskAction::JsBundle, &["lint"]),
                t("markup", TaskAction::Markup, &[]),
                t("production", TaskAction::Group, &["lint", "js-bundle", "markup"]),
            ],
        ))
    }

    fn names(step: &SchedulerStep) -> Vec<&str> {
        step.newly_scheduled.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn roots_start_together_and_dependents_follow() {
        let mut s = scheduler();
        let all = s.graph().upstream_closure("production");

        let step = s.start_run(&all);
        assert_eq!(names(&step), vec!["lint", "markup"]);

        let step = s.step_completion("lint", TaskOutcome::Success);
        assert_eq!(names(&step), vec!["js-bundle"]);

        s.step_completion("markup", TaskOutcome::Success);
        let step = s.step_completion("js-bundle", TaskOutcome::Success);
        assert_eq!(names(&step), vec!["production"]);

        let step = s.step_completion("production", TaskOutcome::Success);
        assert!(step.run_just_finished);
        assert!(s.is_idle());
    }

    #[test]
    fn failure_skips_transitive_dependents_only() {
        let mut s = scheduler();
        let all = s.graph().upstream_closure("production");
        s.start_run(&all);

        let step = s.step_completion("lint", TaskOutcome::Failed("2 problems".into()));
        assert_eq!(
            step.newly_skipped,
            vec![
                ("js-bundle".to_string(), "lint".to_string()),
                ("production".to_string(), "lint".to_string()),
            ]
        );
        assert_eq!(s.run_state_of("markup"), Some(TaskRunState::Running));

        let step = s.step_completion("markup", TaskOutcome::Success);
        assert!(step.run_just_finished);

        let outcomes = s.outcomes();
        assert_eq!(outcomes["markup"], TaskRunState::Success);
        assert_eq!(
            outcomes["production"],
            TaskRunState::Skipped {
                reason: "upstream failure of lint".into()
            }
        );
    }

    #[test]
    fn dependencies_outside_the_run_use_history() {
        let mut s = scheduler();

        // js-bundle depends on lint, which has never run.
        let only_bundle: BTreeSet<String> = ["js-bundle".to_string()].into();
        let step = s.start_run(&only_bundle);
        assert!(step.run_just_finished);
        assert_eq!(
            s.run_state_of("js-bundle"),
            Some(TaskRunState::Skipped {
                reason: "upstream failure of lint".into()
            })
        );

        let lint: BTreeSet<String> = ["lint".to_string()].into();
        s.start_run(&lint);
        s.step_completion("lint", TaskOutcome::Success);

        let step = s.start_run(&only_bundle);
        assert_eq!(names(&step), vec!["js-bundle"]);
    }

    #[test]
    fn stale_and_duplicate_completions_are_ignored() {
        let mut s = scheduler();
        let lint: BTreeSet<String> = ["lint".to_string()].into();
        s.start_run(&lint);
        s.step_completion("lint", TaskOutcome::Success);

        let step = s.step_completion("lint", TaskOutcome::Failed("late".into()));
        assert!(step.newly_scheduled.is_empty());
        assert!(!step.run_just_finished);
    }
}
