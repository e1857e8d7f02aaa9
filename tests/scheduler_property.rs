// tests/scheduler_property.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use spabuild::config::ConfigFile;
use spabuild::dag::{Scheduler, TaskRunState};
use spabuild::engine::TaskOutcome;
use spabuild::types::{BuildVariant, TaskAction};
use spabuild_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_config_strategy(max_tasks: usize) -> impl Strategy<Value = ConfigFile> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        );

        deps_strat.prop_map(move |raw_deps| {
            let mut builder = ConfigFileBuilder::new().with_watch_target("task_0");
            for (i, potential_deps) in raw_deps.into_iter().enumerate() {
                let mut task = TaskConfigBuilder::new(TaskAction::Group);
                if i > 0 {
                    let deps: HashSet<usize> = potential_deps.into_iter().map(|d| d % i).collect();
                    for dep in deps {
                        task = task.after(&format!("task_{dep}"));
                    }
                }
                builder = builder.with_task(&format!("task_{i}"), task.build());
            }
            builder.build()
        })
    })
}

proptest! {
    #[test]
    fn every_run_terminates_with_consistent_outcomes(
        cfg in dag_config_strategy(10),
        target in 0..10usize,
        failing_indices in proptest::collection::vec(0..10usize, 0..4),
    ) {
        let mut scheduler = Scheduler::from_config(&cfg, BuildVariant::Production);
        let names: Vec<String> = scheduler.graph().tasks().iter().map(|s| s.to_string()).collect();
        let target = &names[target % names.len()];
        let failing: HashSet<String> = failing_indices
            .iter()
            .map(|i| names[i % names.len()].clone())
            .collect();

        let selected: BTreeSet<String> = scheduler.graph().upstream_closure(target);
        let step = scheduler.start_run(&selected);
        let mut executing: Vec<String> = step.newly_scheduled.into_iter().map(|t| t.name).collect();
        let mut finished = step.run_just_finished;
        let mut executed = HashSet::new();

        let mut steps = 0;
        while let Some(task) = executing.pop() {
            steps += 1;
            prop_assert!(steps <= 100, "run did not terminate");
            prop_assert!(executed.insert(task.clone()), "task {} dispatched twice", task);

            let outcome = if failing.contains(&task) {
                TaskOutcome::Failed("boom".into())
            } else {
                TaskOutcome::Success
            };
            let step = scheduler.step_completion(&task, outcome);
            executing.extend(step.newly_scheduled.into_iter().map(|t| t.name));
            finished |= step.run_just_finished;
        }

        prop_assert!(finished);
        prop_assert!(scheduler.is_idle());

        let outcomes = scheduler.outcomes();
        prop_assert_eq!(outcomes.keys().cloned().collect::<BTreeSet<_>>(), selected);

        for (name, state) in &outcomes {
            match state {
                TaskRunState::Success => {
                    prop_assert!(!failing.contains(name));
                    for dep in scheduler.graph().dependencies_of(name) {
                        prop_assert_eq!(outcomes.get(dep), Some(&TaskRunState::Success));
                    }
                }
                TaskRunState::Failed { .. } => prop_assert!(failing.contains(name)),
                TaskRunState::Skipped { .. } => prop_assert!(!executed.contains(name)),
                other => prop_assert!(false, "non-terminal state {:?} for {}", other, name),
            }
        }
    }
}
