// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use conventest_runner::{
    convention::Convention,
    errors::WriteEventError,
    failure::{CaseFailures, Failure},
    list::{Fixture, Skip, TestAssembly, TestClass},
    reporter::{Bus, Listener, Message, MessageKind},
    runner::{ExecutionSummary, TestRunner},
    test_eprintln, test_println,
};
use std::{cell::RefCell, rc::Rc};

pub(crate) const CLASS: &str = "SampleTestClass";

/// A shared, ordered log of lifecycle events.
#[derive(Clone, Debug, Default)]
pub(crate) struct Trace(Rc<RefCell<Vec<String>>>);

impl Trace {
    pub(crate) fn log(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum FailDuring {
    Nothing,
    Construction,
    Disposal,
}

pub(crate) struct SampleTestClass {
    trace: Trace,
    fail_dispose: bool,
}

impl SampleTestClass {
    pub(crate) fn new(trace: Trace, fail_dispose: bool) -> Self {
        Self {
            trace,
            fail_dispose,
        }
    }
}

impl Fixture for SampleTestClass {
    fn dispose(&mut self) -> Result<(), Failure> {
        self.trace.log("Dispose");
        if self.fail_dispose {
            return Err(Failure::with_type("DisposalException", "'Dispose' failed!"));
        }
        Ok(())
    }
}

/// A class with a passing case `Pass` and a failing case `Fail`, both of which write to the
/// captured output.
pub(crate) fn sample_class(trace: &Trace, fail: FailDuring) -> TestClass {
    sample_builder(trace, fail).build()
}

/// Like [`sample_class`], with a third case `Skip` carrying a skip marker.
pub(crate) fn sample_class_with_skip(trace: &Trace) -> TestClass {
    let body_trace = trace.clone();
    sample_builder(trace, FailDuring::Nothing)
        .skipped_case("Skip", Skip::with_reason("skipped by marker"), move |_| {
            body_trace.log("Skip");
            Ok(())
        })
        .build()
}

fn sample_builder(
    trace: &Trace,
    fail: FailDuring,
) -> conventest_runner::list::TestClassBuilder<SampleTestClass> {
    let trace = trace.clone();
    TestClass::builder::<SampleTestClass>(CLASS)
        .constructor(move || {
            trace.log(".ctor");
            if fail == FailDuring::Construction {
                return Err(Failure::with_type(
                    "ConstructionException",
                    "'.ctor' failed!",
                ));
            }
            Ok(SampleTestClass::new(
                trace.clone(),
                fail == FailDuring::Disposal,
            ))
        })
        .case("Pass", |instance| {
            instance.trace.log("Pass");
            test_println!("Console.Out: Pass");
            test_eprintln!("Console.Error: Pass");
            Ok(())
        })
        .case("Fail", |instance| {
            instance.trace.log("Fail");
            test_println!("Console.Out: Fail");
            Err(Failure::with_type("FailException", "'Fail' failed!"))
        })
}

pub(crate) fn sample_assembly(class: TestClass) -> TestAssembly {
    TestAssembly::new("sample").with_class(class)
}

/// Records every message published during a run.
#[derive(Clone, Debug, Default)]
pub(crate) struct Recorder(Rc<RefCell<Vec<Message>>>);

impl Recorder {
    pub(crate) fn messages(&self) -> Vec<Message> {
        self.0.borrow().clone()
    }

    /// Returns one line per case result or class failure, in the order they were published.
    pub(crate) fn results(&self) -> Vec<String> {
        self.0
            .borrow()
            .iter()
            .filter_map(|message| match message {
                Message::CaseSkipped {
                    method_group,
                    reason: Some(reason),
                } => Some(format!("{method_group} skipped: {reason}")),
                Message::CaseSkipped {
                    method_group,
                    reason: None,
                } => Some(format!("{method_group} skipped")),
                Message::CasePassed { method_group, .. } => {
                    Some(format!("{method_group} passed"))
                }
                Message::CaseFailed {
                    method_group,
                    failures,
                    ..
                } => Some(format!(
                    "{method_group} failed: {}",
                    failures.primary().message()
                )),
                Message::ClassFailed { class, failure } => {
                    Some(format!("{class} class failed: {}", failure.message()))
                }
                _ => None,
            })
            .collect()
    }

    /// Returns the failures recorded for the named case.
    pub(crate) fn failures(&self, method: &str) -> CaseFailures {
        self.0
            .borrow()
            .iter()
            .find_map(|message| match message {
                Message::CaseFailed {
                    method_group,
                    failures,
                    ..
                } if method_group.method() == method => Some(failures.clone()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no failure recorded for {method}"))
    }

    /// Returns the output captured for the named case.
    pub(crate) fn output(&self, method: &str) -> String {
        self.0
            .borrow()
            .iter()
            .find_map(|message| match message {
                Message::CasePassed {
                    method_group,
                    output,
                    ..
                }
                | Message::CaseFailed {
                    method_group,
                    output,
                    ..
                } if method_group.method() == method => Some(output.clone()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no result recorded for {method}"))
    }
}

impl Listener for Recorder {
    fn subscriptions(&self) -> &'static [MessageKind] {
        MessageKind::ALL
    }

    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError> {
        self.0.borrow_mut().push(message.clone());
        Ok(())
    }
}

/// Runs `assembly` with `convention`, recording every message.
pub(crate) fn run(
    assembly: &TestAssembly,
    convention: Convention,
) -> (Recorder, ExecutionSummary) {
    let recorder = Recorder::default();
    let runner = TestRunner::new(convention.build());
    let mut bus = Bus::new();
    bus.subscribe(recorder.clone());
    let summary = runner
        .run_assembly(assembly, &mut bus)
        .expect("recording listener never fails");
    (recorder, summary)
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_owned()).collect()
}
