// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use conventest_runner::{
    behavior::ClassBehavior,
    convention::Convention,
    execution::ClassExecution,
    failure::{Failure, FailureStage},
    list::{Fixture, TestClass},
    runner::NOT_RUN_REASON,
};
use pretty_assertions::assert_eq;
use test_case::test_case;

#[test]
fn class_wraps_nest_in_registration_order() {
    let trace = Trace::default();
    let mut convention = Convention::default();
    for name in ["A", "B"] {
        let trace = trace.clone();
        convention.class_execution.wrap(move |execution, next| {
            trace.log(format!("{name} before"));
            next.run(execution);
            trace.log(format!("{name} after"));
            Ok(())
        });
    }
    convention.class_execution.create_instance_per_class();

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    run(&assembly, convention);

    assert_eq!(
        trace.entries(),
        strings(&[
            "A before", "B before", ".ctor", "Pass", "Fail", "Dispose", "B after", "A after",
        ])
    );
}

#[test]
fn class_set_up_failure_fails_every_case() {
    let trace = Trace::default();
    let tear_down_trace = trace.clone();
    let mut convention = Convention::default();
    convention.class_execution.set_up_tear_down(
        |_| Err(Failure::with_type("SetUpException", "class set up failed")),
        move |_| {
            tear_down_trace.log("tear down");
            Ok(())
        },
    );

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, summary) = run(&assembly, convention);

    assert_eq!(trace.entries(), Vec::<String>::new());
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass failed: class set up failed",
            "SampleTestClass.Fail failed: class set up failed",
        ])
    );
    assert_eq!(
        recorder.failures("Pass").primary().stage(),
        Some(FailureStage::ClassBehavior)
    );
    assert_eq!(summary.failed, 2);
}

#[test]
fn class_wrap_failure_after_next_does_not_report_twice() {
    let trace = Trace::default();
    let mut convention = Convention::default();
    convention.class_execution.wrap(|execution, next| {
        next.run(execution);
        Err(Failure::new("too late"))
    });

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, summary) = run(&assembly, convention);

    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass.Fail failed: 'Fail' failed!",
        ])
    );
    assert_eq!((summary.passed, summary.failed), (1, 1));
}

#[test]
fn class_wrap_panic_is_a_failure() {
    let trace = Trace::default();
    let mut convention = Convention::default();
    convention.class_execution.wrap(|_, _| panic!("wrap exploded"));

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, _) = run(&assembly, convention);

    let failure = recorder.failures("Fail").primary().clone();
    assert_eq!(failure.type_name(), "panic");
    assert_eq!(failure.message(), "wrap exploded");
    assert_eq!(failure.stage(), Some(FailureStage::ClassBehavior));
}

struct Steps(Trace);

impl Fixture for Steps {}

fn three_step_class(trace: &Trace) -> TestClass {
    let trace = trace.clone();
    TestClass::builder::<Steps>("Steps")
        .constructor(move || Ok(Steps(trace.clone())))
        .case("First", |instance| {
            instance.0.log("First");
            Ok(())
        })
        .case("Second", |instance| {
            instance.0.log("Second");
            Err(Failure::new("'Second' failed!"))
        })
        .case("Third", |instance| {
            instance.0.log("Third");
            Ok(())
        })
        .build()
}

/// Runs and completes the first two cases on one instance, then gives up.
struct GivesUpAfterTwo;

impl ClassBehavior for GivesUpAfterTwo {
    fn execute(&self, execution: &mut ClassExecution<'_>) {
        let mut instance = match execution.class().construct() {
            Ok(instance) => instance,
            Err(failure) => {
                execution.fail_remaining_cases(failure);
                return;
            }
        };
        for index in 0..2 {
            execution.run_case(index, &mut *instance);
            execution.complete_case(index);
        }
        panic!("strategy gave up");
    }
}

#[test_case(true ; "inside a wrap")]
#[test_case(false ; "without wraps")]
fn failure_after_some_cases_leaves_completed_cases(wrapped: bool) {
    let trace = Trace::default();
    let mut convention = Convention::default();
    convention
        .class_execution
        .set_instance_strategy(GivesUpAfterTwo);
    if wrapped {
        let wrap_trace = trace.clone();
        convention.class_execution.wrap(move |execution, next| {
            next.run(execution);
            wrap_trace.log("after next");
            Ok(())
        });
    }

    let assembly = sample_assembly(three_step_class(&trace));
    let (recorder, summary) = run(&assembly, convention);

    // A panic unwinds through the wrap, so its trailing code never runs.
    assert_eq!(trace.entries(), strings(&["First", "Second"]));
    assert_eq!(
        recorder.results(),
        strings(&[
            "Steps.First passed",
            "Steps.Second failed: 'Second' failed!",
            "Steps.Third failed: strategy gave up",
        ])
    );
    assert_eq!(
        recorder.failures("Second").primary().stage(),
        Some(FailureStage::CaseInvocation)
    );
    let failure = recorder.failures("Third").primary().clone();
    assert_eq!(failure.type_name(), "panic");
    assert_eq!(failure.stage(), Some(FailureStage::ClassBehavior));
    assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 2, 0));
}

#[test]
fn vetoed_cases_are_skipped() {
    let trace = Trace::default();
    let mut convention = Convention::default();
    convention.class_execution.wrap(|_, _| Ok(()));

    let assembly = sample_assembly(sample_class_with_skip(&trace));
    let (recorder, summary) = run(&assembly, convention);

    assert_eq!(trace.entries(), Vec::<String>::new());
    assert_eq!(
        recorder.results(),
        vec![
            format!("SampleTestClass.Pass skipped: {NOT_RUN_REASON}"),
            format!("SampleTestClass.Fail skipped: {NOT_RUN_REASON}"),
            "SampleTestClass.Skip skipped: skipped by marker".to_owned(),
        ]
    );
    assert_eq!(summary.skipped, 3);
}

#[test]
fn class_behavior_can_inspect_results() {
    let trace = Trace::default();
    let after_trace = trace.clone();
    let mut convention = Convention::default();
    convention.class_execution.wrap(move |execution, next| {
        next.run(execution);
        let failed = execution
            .cases()
            .iter()
            .filter(|case| case.has_failed())
            .map(|case| case.method_group().to_string())
            .collect::<Vec<_>>();
        after_trace.log(format!("failed: {}", failed.join(", ")));
        Ok(())
    });

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    run(&assembly, convention);

    assert_eq!(
        trace.entries().last().map(String::as_str),
        Some("failed: SampleTestClass.Fail")
    );
}

#[test]
fn case_set_up_and_tear_down_surround_each_case() {
    let trace = Trace::default();
    let set_up = trace.clone();
    let tear_down = trace.clone();
    let mut convention = Convention::default();
    convention.case_execution.set_up_tear_down(
        move |case, _| {
            set_up.log(format!("set up {}", case.case().name()));
            Ok(())
        },
        move |case, _| {
            tear_down.log(format!("tear down {}", case.case().name()));
            Ok(())
        },
    );

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    run(&assembly, convention);

    assert_eq!(
        trace.entries(),
        strings(&[
            ".ctor",
            "set up Pass",
            "Pass",
            "tear down Pass",
            "Dispose",
            ".ctor",
            "set up Fail",
            "Fail",
            "tear down Fail",
            "Dispose",
        ])
    );
}

#[test]
fn case_wrap_failure_belongs_to_one_case() {
    let trace = Trace::default();
    let mut convention = Convention::default();
    convention.case_execution.set_up(|case, _| {
        if case.case().name() == "Pass" {
            return Err(Failure::with_type("SetUpException", "no set up for Pass"));
        }
        Ok(())
    });

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, _) = run(&assembly, convention);

    assert_eq!(
        trace.entries(),
        strings(&[".ctor", "Dispose", ".ctor", "Fail", "Dispose"])
    );
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass failed: no set up for Pass",
            "SampleTestClass.Fail failed: 'Fail' failed!",
        ])
    );
    assert_eq!(
        recorder.failures("Pass").primary().stage(),
        Some(FailureStage::CaseBehavior)
    );
}

#[test]
fn case_wrap_can_run_a_case_repeatedly() {
    let trace = Trace::default();
    let mut convention = Convention::default();
    convention.class_execution.create_instance_per_class();
    convention.case_execution.wrap(|case, instance, next| {
        next.run(case, instance);
        next.run(case, instance);
        Ok(())
    });

    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, _) = run(&assembly, convention);

    assert_eq!(
        trace.entries(),
        strings(&[".ctor", "Pass", "Pass", "Fail", "Fail", "Dispose"])
    );

    // Both failures are kept, the second as a secondary failure.
    let failures = recorder.failures("Fail");
    assert_eq!(failures.secondary().len(), 1);
    assert_eq!(recorder.results().len(), 2);
}
