// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use clap::Parser;
use color_eyre::Result;
use conventest_metadata::{ConventestExitCode, FrameReader, Test, TestOutcome, TestResult};
use conventest_runner::{
    config::CiEnvironment,
    convention::Convention,
    errors::WriteEventError,
    harness::HarnessOpts,
    reporter::{
        Bus, ConsoleListener, JunitListener, Listener, Message, MessageKind, TeamCityListener,
        TestExplorerListener,
    },
    runner::TestRunner,
    test_output::CaptureMode,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn run_with(listener: impl Listener, mut convention: Convention, trace: &Trace) -> Result<()> {
    // Output is compared exactly, and libtest reports other tests on this process's stdout.
    convention.output_capture = CaptureMode::Thread;
    let assembly = sample_assembly(sample_class_with_skip(trace));
    let runner = TestRunner::new(convention.build());
    let mut bus = Bus::new();
    bus.subscribe(listener);
    runner.run_assembly(&assembly, &mut bus)?;
    Ok(())
}

#[test]
fn result_stream_records_every_outcome() -> Result<()> {
    let mut buf = Vec::new();
    run_with(
        TestExplorerListener::new(&mut buf),
        Convention::default(),
        &Trace::default(),
    )?;

    let results: Vec<TestResult> = FrameReader::new(buf.as_slice()).read_to_end()?;
    assert_eq!(results.len(), 3);

    let pass = &results[0];
    assert_eq!(pass.fully_qualified_name, "SampleTestClass.Pass");
    assert_eq!(pass.display_name, "SampleTestClass.Pass");
    assert_eq!(pass.outcome, TestOutcome::Passed);
    assert_eq!(
        pass.output.as_deref(),
        Some("Console.Out: Pass\nConsole.Error: Pass\n")
    );
    assert_eq!(pass.error_message, None);
    assert_eq!(pass.error_stack_trace, None);

    let fail = &results[1];
    assert_eq!(fail.outcome, TestOutcome::Failed);
    assert_eq!(fail.output.as_deref(), Some("Console.Out: Fail\n"));
    assert_eq!(fail.error_message.as_deref(), Some("'Fail' failed!"));
    let stack_trace = fail.error_stack_trace.as_deref().unwrap_or_default();
    assert!(
        stack_trace.starts_with("FailException (during case)\n"),
        "{stack_trace}"
    );

    let skip = &results[2];
    assert_eq!(skip.outcome, TestOutcome::Skipped);
    assert_eq!(skip.duration, Duration::ZERO);
    assert_eq!(skip.output, None);
    assert_eq!(skip.error_message.as_deref(), Some("skipped by marker"));
    assert_eq!(skip.error_stack_trace, None);

    Ok(())
}

#[test]
fn result_stream_records_discovery() -> Result<()> {
    let assembly = sample_assembly(sample_class_with_skip(&Trace::default()));
    let runner = TestRunner::default();

    let mut buf = Vec::new();
    let mut bus = Bus::new();
    bus.subscribe(TestExplorerListener::new(&mut buf));
    runner.discover(&assembly, &mut bus)?;
    drop(bus);

    let tests: Vec<Test> = FrameReader::new(buf.as_slice()).read_to_end()?;
    let names: Vec<_> = tests
        .iter()
        .map(|test| test.fully_qualified_name.as_str())
        .collect();
    assert_eq!(
        names,
        ["SampleTestClass.Pass", "SampleTestClass.Fail", "SampleTestClass.Skip"]
    );
    Ok(())
}

#[test]
fn teamcity_reports_a_whole_run() -> Result<()> {
    let mut buf = Vec::new();
    run_with(
        TeamCityListener::new(&mut buf),
        Convention::default(),
        &Trace::default(),
    )?;
    let output = String::from_utf8(buf)?;
    let lines: Vec<_> = output.lines().collect();

    assert_eq!(lines[0], "##teamcity[testSuiteStarted name='sample']");
    assert_eq!(lines[1], "##teamcity[testStarted name='SampleTestClass.Pass']");
    assert_eq!(
        lines[2],
        "##teamcity[testStdOut name='SampleTestClass.Pass' \
         out='Console.Out: Pass|nConsole.Error: Pass|n']"
    );
    assert!(
        lines[3].starts_with("##teamcity[testFinished name='SampleTestClass.Pass' duration='"),
        "{}",
        lines[3]
    );
    assert!(
        lines
            .iter()
            .any(|line| line.starts_with(
                "##teamcity[testFailed name='SampleTestClass.Fail' message='|'Fail|' failed!'"
            )),
        "{output}"
    );
    assert!(lines.contains(
        &"##teamcity[testIgnored name='SampleTestClass.Skip' message='skipped by marker']"
    ));
    assert_eq!(
        lines.last().copied(),
        Some("##teamcity[testSuiteFinished name='sample']")
    );
    Ok(())
}

#[test]
fn console_reports_a_whole_run() -> Result<()> {
    let mut buf = Vec::new();
    run_with(
        ConsoleListener::new(&mut buf),
        Convention::default(),
        &Trace::default(),
    )?;
    let output = String::from_utf8(buf)?;

    assert!(output.contains("PASS ["), "{output}");
    assert!(output.contains("SampleTestClass.Pass\n"), "{output}");
    assert!(output.contains("----- FAILURE: SampleTestClass.Fail\n'Fail' failed!\n"));
    assert!(output.contains("SampleTestClass.Skip: skipped by marker\n"));
    assert!(
        output.contains("3 cases run: 1 passed, 1 failed, 1 skipped\n"),
        "{output}"
    );
    Ok(())
}

#[test]
fn junit_report_covers_every_class() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let path = dir.path().join("reports/junit.xml");

    let mut convention = Convention::default();
    convention.class_execution.create_instance_per_class();
    let trace = Trace::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Disposal));
    let runner = TestRunner::new(convention.build());
    let mut bus = Bus::new();
    bus.subscribe(JunitListener::new(path.clone()));
    runner.run_assembly(&assembly, &mut bus)?;
    drop(bus);

    let xml = std::fs::read_to_string(&path)?;
    assert!(xml.contains(r#"<testsuites name="sample""#), "{xml}");
    assert!(xml.contains(r#"<testsuite name="SampleTestClass""#), "{xml}");
    assert!(xml.contains(r#"<testcase name="Pass""#), "{xml}");
    assert!(xml.contains(r#"type="FailException""#), "{xml}");
    assert!(xml.contains(r#"<testcase name="(class)""#), "{xml}");
    assert!(
        xml.contains(r#"type="DisposalException""#),
        "class failure recorded as an error: {xml}"
    );
    Ok(())
}

struct FailingListener;

impl Listener for FailingListener {
    fn subscriptions(&self) -> &'static [MessageKind] {
        &[MessageKind::CasePassed]
    }

    fn handle(&mut self, _message: &Message) -> Result<(), WriteEventError> {
        Err(WriteEventError::Io(std::io::Error::other("listener is gone")))
    }
}

#[test]
fn listener_failure_aborts_the_run() {
    let trace = Trace::default();
    let recorder = Recorder::default();
    let assembly = sample_assembly(sample_class(&trace, FailDuring::Nothing));
    let runner = TestRunner::default();

    let mut bus = Bus::new();
    bus.subscribe(recorder.clone());
    bus.subscribe(FailingListener);
    let error = runner.run_assembly(&assembly, &mut bus).unwrap_err();
    drop(bus);

    assert!(matches!(error, WriteEventError::Io(_)), "{error:?}");
    assert_eq!(trace.entries(), strings(&[".ctor", "Pass", "Dispose"]));
    assert!(
        !recorder
            .messages()
            .iter()
            .any(|message| matches!(message, Message::AssemblyCompleted { .. })),
        "no completion after an aborted run"
    );
}

fn exec_harness(args: &[&str], env: &CiEnvironment) -> i32 {
    exec_harness_with(args, env, Vec::new())
}

fn exec_harness_with(
    args: &[&str],
    env: &CiEnvironment,
    listeners: Vec<Box<dyn Listener>>,
) -> i32 {
    let assembly = sample_assembly(sample_class(&Trace::default(), FailDuring::Nothing));
    let opts = HarnessOpts::try_parse_from(args).expect("valid arguments");
    opts.exec_with_listeners(&assembly, Convention::default(), listeners, env)
}

#[test]
fn harness_writes_result_stream_from_environment() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let stream = dir.path().join("results.bin");
    let env = CiEnvironment {
        result_stream: Some(stream.clone()),
        ..Default::default()
    };

    let code = exec_harness(&["harness", "run"], &env);
    assert_eq!(code, ConventestExitCode::TEST_RUN_FAILED);
    let results: Vec<TestResult> = FrameReader::new(std::fs::File::open(&stream)?).read_to_end()?;
    assert_eq!(results.len(), 2);

    let code = exec_harness(
        &["harness", "run-methods", "SampleTestClass.Pass"],
        &env,
    );
    assert_eq!(code, ConventestExitCode::OK);
    let results: Vec<TestResult> = FrameReader::new(std::fs::File::open(&stream)?).read_to_end()?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].outcome, TestOutcome::Passed);

    let code = exec_harness(&["harness", "discover"], &env);
    assert_eq!(code, ConventestExitCode::OK);
    let tests: Vec<Test> = FrameReader::new(std::fs::File::open(&stream)?).read_to_end()?;
    assert_eq!(tests.len(), 2);
    Ok(())
}

#[test]
fn harness_exit_codes_for_bad_selections() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let env = CiEnvironment {
        result_stream: Some(dir.path().join("results.bin")),
        ..Default::default()
    };

    assert_eq!(
        exec_harness(&["harness", "run-methods", "SampleTestClass.Missing"], &env),
        ConventestExitCode::NO_TESTS_RUN
    );
    assert_eq!(
        exec_harness(&["harness", "run-methods", "NoSeparator"], &env),
        ConventestExitCode::SETUP_ERROR
    );

    let missing_dir = CiEnvironment {
        result_stream: Some(dir.path().join("missing/results.bin")),
        ..Default::default()
    };
    assert_eq!(
        exec_harness(&["harness", "run"], &missing_dir),
        ConventestExitCode::SETUP_ERROR
    );
    Ok(())
}

#[test]
fn harness_custom_listeners_replace_defaults() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let stream = dir.path().join("results.bin");
    let env = CiEnvironment {
        result_stream: Some(stream.clone()),
        ..Default::default()
    };

    let recorder = Recorder::default();
    let code = exec_harness_with(
        &["harness", "run"],
        &env,
        vec![Box::new(recorder.clone()) as Box<dyn Listener>],
    );
    assert_eq!(code, ConventestExitCode::TEST_RUN_FAILED);
    assert_eq!(
        recorder.results(),
        strings(&[
            "SampleTestClass.Pass passed",
            "SampleTestClass.Fail failed: 'Fail' failed!",
        ])
    );
    assert!(!stream.exists(), "default result stream is not written");

    let discovered = Recorder::default();
    let code = exec_harness_with(
        &["harness", "discover"],
        &env,
        vec![Box::new(discovered.clone()) as Box<dyn Listener>],
    );
    assert_eq!(code, ConventestExitCode::OK);
    assert_eq!(discovered.messages().len(), 2);
    assert!(!stream.exists());
    Ok(())
}

#[test]
fn harness_reports_custom_listener_failure() {
    let code = exec_harness_with(
        &["harness", "run"],
        &CiEnvironment::default(),
        vec![Box::new(FailingListener) as Box<dyn Listener>],
    );
    assert_eq!(code, ConventestExitCode::WRITE_OUTPUT_ERROR);
}
