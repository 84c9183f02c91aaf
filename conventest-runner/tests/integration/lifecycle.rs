// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use clap::Parser;
use conventest_metadata::ConventestExitCode;
use conventest_runner::{
    config::CiEnvironment,
    convention::Convention,
    failure::{Failure, FailureStage},
    harness::HarnessOpts,
    list::{Fixture, TestAssembly, TestClass},
    reporter::Listener,
    test_output::CaptureMode,
};
use pretty_assertions::assert_eq;
use std::io::Write;

fn per_case() -> Convention {
    let mut convention = Convention::default();
    convention.class_execution.create_instance_per_case();
    convention
}

fn per_class() -> Convention {
    let mut convention = Convention::default();
    convention.class_execution.create_instance_per_class();
    convention
}

#[test]
fn per_case_constructs_an_instance_for_every_case() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, summary) = run(&assembly, per_case());

    assert_eq!(
        trace.entries(),
        strings(&[".ctor", "Pass", "Dispose", ".ctor", "Fail", "Dispose"])
    );
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass.Fail failed: 'Fail' failed!",
        ])
    );
    assert_eq!((summary.passed, summary.failed, summary.skipped), (1, 1, 0));
}

#[test]
fn default_convention_is_per_case() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    run(&assembly, Convention::default());

    assert_eq!(
        trace.entries(),
        strings(&[".ctor", "Pass", "Dispose", ".ctor", "Fail", "Dispose"])
    );
}

#[test]
fn per_class_shares_one_instance() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, _) = run(&assembly, per_class());

    assert_eq!(
        trace.entries(),
        strings(&[".ctor", "Pass", "Fail", "Dispose"])
    );
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass.Fail failed: 'Fail' failed!",
        ])
    );
}

#[test]
fn output_is_captured_per_case() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let mut convention = per_class();
    // libtest reports other tests on this process's stdout.
    convention.output_capture = CaptureMode::Thread;
    let (recorder, _) = run(&assembly, convention);

    assert_eq!(
        recorder.output("Pass"),
        "Console.Out: Pass\nConsole.Error: Pass\n"
    );
    assert_eq!(recorder.output("Fail"), "Console.Out: Fail\n");
}

#[cfg(unix)]
#[test]
fn standard_streams_are_captured_per_case() {
    let class = TestClass::builder::<SampleTestClass>(CLASS)
        .constructor(|| Ok(SampleTestClass::new(Trace::default(), false)))
        .case("Print", |_| {
            // libtest intercepts `println!` in its own harness, so write to the streams directly.
            writeln!(std::io::stdout(), "hello from stdout")?;
            writeln!(std::io::stderr(), "hello from stderr")?;
            Ok(())
        })
        .case("Quiet", |_| Ok(()))
        .build();
    let assembly = TestAssembly::new("streams").with_class(class);
    let (recorder, _) = run(&assembly, Convention::default());

    let output = recorder.output("Print");
    assert!(output.contains("hello from stdout\n"), "{output:?}");
    assert!(output.contains("hello from stderr\n"), "{output:?}");
    assert!(
        !recorder.output("Quiet").contains("hello from"),
        "output belongs to the case that wrote it"
    );
}

#[test]
fn skipping_every_case_never_constructs() {
    for convention in [per_case(), per_class()] {
        let mut convention = convention;
        convention.case_execution.skip_if(|_| true);

        let trace = Trace::default();
        let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
        let (recorder, summary) = run(&assembly, convention);

        assert_eq!(trace.entries(), Vec::<String>::new());
        assert_eq!(
            recorder.results(),
            strings(&["SampleTestClass.Pass skipped", "SampleTestClass.Fail skipped"])
        );
        assert_eq!(summary.skipped, 2);
    }
}

#[test]
fn skip_markers_are_honored_by_default() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class_with_skip(&trace));
    let (recorder, _) = run(&assembly, per_case());

    assert!(!trace.entries().contains(&"Skip".to_owned()));
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass.Fail failed: 'Fail' failed!",
            "SampleTestClass.Skip skipped: skipped by marker",
        ])
    );
}

#[test]
fn per_case_construction_failure_fails_each_case() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Construction));
    let (recorder, summary) = run(&assembly, per_case());

    assert_eq!(trace.entries(), strings(&[".ctor", ".ctor"]));
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass failed: '.ctor' failed!",
            "SampleTestClass.Fail failed: '.ctor' failed!",
        ])
    );
    let failure = recorder.failures("Pass").primary().clone();
    assert_eq!(failure.type_name(), "ConstructionException");
    assert_eq!(failure.stage(), Some(FailureStage::Construction));
    assert_eq!(summary.failed, 2);
}

#[test]
fn per_class_construction_failure_fails_every_case() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Construction));
    let (recorder, _) = run(&assembly, per_class());

    assert_eq!(trace.entries(), strings(&[".ctor"]));
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass failed: '.ctor' failed!",
            "SampleTestClass.Fail failed: '.ctor' failed!",
        ])
    );
    // No case ran, so none has output.
    assert_eq!(recorder.output("Pass"), "");
}

#[test]
fn custom_factory_failures_are_labelled() {
    let mut convention = Convention::default();
    convention
        .class_execution
        .create_instance_per_class_with(|_| {
            Err(Failure::with_type("FactoryException", "no instance today"))
        });

    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let (recorder, _) = run(&assembly, convention);

    let failure = recorder.failures("Fail").primary().clone();
    assert_eq!(failure.message(), "no instance today");
    assert_eq!(failure.stage(), Some(FailureStage::CustomFactory));
    assert!(
        recorder
            .failures("Pass")
            .compound_stack_trace()
            .starts_with("FactoryException (during custom factory)\n"),
    );
}

#[test]
fn custom_factory_replaces_the_constructor() {
    let factory_trace = Trace::default();
    let trace = factory_trace.clone();
    let mut convention = Convention::default();
    convention
        .class_execution
        .create_instance_per_case_with(move |class| {
            trace.log(format!("factory for {}", class.name()));
            Ok(Box::new(SampleTestClass::new(trace.clone(), false)) as Box<dyn Fixture>)
        });

    let class_trace = Trace::default();
    let assembly = sample_assembly(sample_class(&class_trace, FailDuring::Nothing));
    let (recorder, _) = run(&assembly, convention);

    assert_eq!(class_trace.entries(), Vec::<String>::new());
    assert_eq!(
        factory_trace.entries(),
        strings(&[
            "factory for SampleTestClass",
            "Pass",
            "Dispose",
            "factory for SampleTestClass",
            "Fail",
            "Dispose",
        ])
    );
    assert_eq!(recorder.results().len(), 2);
}

#[test]
fn per_case_disposal_failure_belongs_to_the_case() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Disposal));
    let (recorder, summary) = run(&assembly, per_case());

    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass failed: 'Dispose' failed!",
            "SampleTestClass.Fail failed: 'Fail' failed!",
        ])
    );
    assert_eq!(
        recorder.failures("Pass").primary().stage(),
        Some(FailureStage::Disposal)
    );

    let fail = recorder.failures("Fail");
    assert_eq!(fail.secondary().len(), 1);
    assert_eq!(fail.secondary()[0].type_name(), "DisposalException");
    assert!(
        fail.compound_stack_trace()
            .contains("===== Secondary Failure: DisposalException ====="),
    );
    assert_eq!(summary.failed, 2);
}

#[test]
fn per_class_disposal_failure_is_a_class_failure() {
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Disposal));
    let (recorder, summary) = run(&assembly, per_class());

    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass.Fail failed: 'Fail' failed!",
            "SampleTestClass class failed: 'Dispose' failed!",
        ])
    );
    assert_eq!((summary.passed, summary.failed), (1, 1));
    assert_eq!(summary.class_failures, 1);
}

/// A class whose only case passes, but whose shared instance fails to dispose.
fn passing_class_failing_disposal(trace: &Trace) -> TestAssembly {
    let constructor_trace = trace.clone();
    let class = TestClass::builder::<SampleTestClass>(CLASS)
        .constructor(move || Ok(SampleTestClass::new(constructor_trace.clone(), true)))
        .case("Pass", |_| Ok(()))
        .build();
    TestAssembly::new("disposal").with_class(class)
}

#[test]
fn class_failure_alone_fails_the_run() {
    let trace = Trace::default();
    let assembly = passing_class_failing_disposal(&trace);
    let (recorder, summary) = run(&assembly, per_class());

    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass class failed: 'Dispose' failed!",
        ])
    );
    assert_eq!((summary.passed, summary.failed, summary.class_failures), (1, 0, 1));
    assert!(!summary.is_success(), "{summary:?}");
}

#[test]
fn class_failure_alone_fails_the_harness() {
    let assembly = passing_class_failing_disposal(&Trace::default());
    let recorder = Recorder::default();
    let opts = HarnessOpts::try_parse_from(["harness", "run"]).expect("valid arguments");

    let code = opts.exec_with_listeners(
        &assembly,
        per_class(),
        vec![Box::new(recorder.clone()) as Box<dyn Listener>],
        &CiEnvironment::default(),
    );

    assert_eq!(code, ConventestExitCode::TEST_RUN_FAILED);
    assert_eq!(recorder.results().len(), 2);
}

#[test]
fn panics_are_contained() {
    let class = TestClass::builder::<SampleTestClass>(CLASS)
        .constructor(|| Ok(SampleTestClass::new(Trace::default(), false)))
        .case("Panic", |_| panic!("boom"))
        .case("Pass", |_| Ok(()))
        .build();
    let assembly = TestAssembly::new("panics").with_class(class);
    let (recorder, _) = run(&assembly, per_case());

    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Panic failed: boom",
            "SampleTestClass.Pass passed",
        ])
    );
    let failure = recorder.failures("Panic").primary().clone();
    assert_eq!(failure.type_name(), "panic");
    assert_eq!(failure.stage(), Some(FailureStage::CaseInvocation));
    assert!(
        failure
            .stack_trace()
            .is_some_and(|trace| trace.contains("lifecycle.rs")),
        "{failure:?}"
    );
    assert!(recorder.output("Panic").contains("boom"));
}

#[test]
fn errors_convert_into_failures() {
    let class = TestClass::builder::<SampleTestClass>(CLASS)
        .constructor(|| Ok(SampleTestClass::new(Trace::default(), false)))
        .case("Parse", |_| {
            let _: u16 = "not a port".parse()?;
            Ok(())
        })
        .build();
    let assembly = TestAssembly::new("errors").with_class(class);
    let (recorder, _) = run(&assembly, per_case());

    let failure = recorder.failures("Parse").primary().clone();
    assert_eq!(failure.message(), "invalid digit found in string");
    assert_eq!(failure.type_name(), "core::num::error::ParseIntError");
}
