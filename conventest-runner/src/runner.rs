// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`].

use crate::{
    convention::ExecutionPlan,
    errors::WriteEventError,
    execution::ClassExecution,
    failure::{FailureStage, run_guarded},
    list::{Case, TestAssembly, TestClass, TestMethod},
    reporter::{Bus, Message},
    stopwatch::Stopwatch,
};
use conventest_metadata::MethodGroup;
use indexmap::IndexSet;
use std::{ops::AddAssign, time::Duration};
use tracing::{debug, info, warn};

/// The skip reason given to cases that a class behavior chose not to run.
pub const NOT_RUN_REASON: &str = "class behavior did not run this case";

/// Statistics for a run, or for one class within a run.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionSummary {
    /// The number of cases that passed.
    pub passed: usize,

    /// The number of cases that failed.
    pub failed: usize,

    /// The number of cases that were skipped.
    pub skipped: usize,

    /// The number of failures that belonged to a class rather than to one of its cases, such
    /// as a shared instance failing to dispose.
    pub class_failures: usize,

    /// The wall-clock time taken.
    pub duration: Duration,
}

impl ExecutionSummary {
    /// Returns the total number of cases that reached an outcome.
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Returns true if no case and no class failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.class_failures == 0
    }
}

impl AddAssign for ExecutionSummary {
    fn add_assign(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.class_failures += other.class_failures;
        self.duration += other.duration;
    }
}

/// Runs the cases of a [`TestAssembly`] according to an [`ExecutionPlan`].
///
/// Classes, and the cases within each class, run one at a time on the calling thread. Results
/// are published to a [`Bus`] as they are produced.
#[derive(Debug, Default)]
pub struct TestRunner {
    plan: ExecutionPlan,
}

impl TestRunner {
    /// Creates a new runner with the given plan.
    pub fn new(plan: ExecutionPlan) -> Self {
        Self { plan }
    }

    /// Publishes a [`Message::MethodDiscovered`] for every case in the assembly, without running
    /// anything.
    pub fn discover(
        &self,
        assembly: &TestAssembly,
        bus: &mut Bus<'_>,
    ) -> Result<(), WriteEventError> {
        for case in assembly.cases() {
            bus.publish(&Message::MethodDiscovered {
                method_group: case.method_group().clone(),
            })?;
        }
        debug!(assembly = %assembly.name(), cases = assembly.case_count(), "discovery complete");
        Ok(())
    }

    /// Runs every case in the assembly.
    pub fn run_assembly(
        &self,
        assembly: &TestAssembly,
        bus: &mut Bus<'_>,
    ) -> Result<ExecutionSummary, WriteEventError> {
        self.run(assembly, |_| true, bus)
    }

    /// Runs only the cases whose identity is in `methods`.
    ///
    /// Cases run in the order the assembly declares them, not the order of `methods`.
    pub fn run_methods(
        &self,
        assembly: &TestAssembly,
        methods: &[MethodGroup],
        bus: &mut Bus<'_>,
    ) -> Result<ExecutionSummary, WriteEventError> {
        let selected: IndexSet<&MethodGroup> = methods.iter().collect();
        for method_group in &selected {
            if !assembly
                .cases()
                .any(|case| case.method_group() == *method_group)
            {
                warn!(%method_group, "no case matches requested method");
            }
        }

        self.run(assembly, |case| selected.contains(case.method_group()), bus)
    }

    fn run(
        &self,
        assembly: &TestAssembly,
        is_selected: impl Fn(&Case) -> bool,
        bus: &mut Bus<'_>,
    ) -> Result<ExecutionSummary, WriteEventError> {
        let stopwatch = Stopwatch::start();
        info!(assembly = %assembly.name(), "starting run");
        bus.publish(&Message::AssemblyStarted {
            assembly: assembly.name().to_owned(),
            timestamp: stopwatch.started_at().fixed_offset(),
        })?;

        let mut summary = ExecutionSummary::default();
        for class in assembly.classes() {
            let methods: Vec<_> = class
                .methods()
                .iter()
                .filter(|method| is_selected(method.case()))
                .collect();
            if methods.is_empty() {
                continue;
            }
            summary += self.run_class(class, methods, bus)?;
        }
        summary.duration = stopwatch.elapsed();

        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            class_failures = summary.class_failures,
            "run complete",
        );
        bus.publish(&Message::AssemblyCompleted {
            assembly: assembly.name().to_owned(),
            summary,
        })?;
        Ok(summary)
    }

    fn run_class(
        &self,
        class: &TestClass,
        methods: Vec<&TestMethod>,
        bus: &mut Bus<'_>,
    ) -> Result<ExecutionSummary, WriteEventError> {
        let stopwatch = Stopwatch::start();
        debug!(class = %class.name(), cases = methods.len(), "starting class");
        bus.publish(&Message::ClassStarted {
            class: class.name().into(),
            case_count: methods.len(),
        })?;

        let mut execution = ClassExecution::new(class, methods, &self.plan, &mut *bus);
        // Order every case first; skip decisions are made afterwards, once per case.
        let ordered = run_guarded(FailureStage::CaseOrdering, || {
            self.plan.order().apply(execution.cases_mut());
            Ok(())
        });
        match ordered {
            Ok(()) => {
                for case in execution.cases_mut() {
                    let skip = self.plan.skip(case.case());
                    case.set_skip(skip);
                }
                // Wraps contain their own failures; this catches a panicking instance strategy.
                let executed = run_guarded(FailureStage::ClassBehavior, || {
                    self.plan.class_behavior().execute(&mut execution);
                    Ok(())
                });
                if let Err(failure) = executed {
                    execution.fail_remaining_cases(failure);
                }
            }
            Err(failure) => {
                warn!(class = %class.name(), %failure, "ordering cases failed");
                execution.fail_remaining_cases(failure);
            }
        }
        execution.skip_remaining_cases(NOT_RUN_REASON);

        let mut summary = execution.finish()?;
        summary.duration = stopwatch.elapsed();
        bus.publish(&Message::ClassCompleted {
            class: class.name().into(),
            summary,
        })?;
        Ok(summary)
    }
}
