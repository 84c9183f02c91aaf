// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution state for one class and its cases.
//!
//! A [`ClassExecution`] is created by the runner for every class it runs, and is passed to the
//! class behavior chain. It owns a [`CaseExecution`] per selected case and is the only thing that
//! publishes case results, which is how the runner guarantees that every case reaches exactly one
//! terminal outcome.

use crate::{
    convention::ExecutionPlan,
    errors::WriteEventError,
    failure::{CaseFailures, Failure},
    list::{Case, Fixture, Skip, TestClass, TestMethod},
    reporter::{Bus, Message},
    runner::ExecutionSummary,
    stopwatch::Stopwatch,
    test_output::OutputCapture,
};
use conventest_metadata::MethodGroup;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Where a [`ClassExecution`] sends the messages it produces.
pub(crate) trait MessageSink {
    fn publish(&mut self, message: &Message) -> Result<(), WriteEventError>;
}

impl MessageSink for Bus<'_> {
    fn publish(&mut self, message: &Message) -> Result<(), WriteEventError> {
        Bus::publish(self, message)
    }
}

/// The state of a case within a class execution.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CaseState {
    /// The case has not reached a terminal outcome yet.
    Pending,
    /// The case was skipped.
    Skipped,
    /// The case passed.
    Passed,
    /// The case failed.
    Failed,
}

impl CaseState {
    /// Returns true if the case has reached a terminal outcome.
    pub fn is_completed(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One case's run within a [`ClassExecution`].
#[derive(Debug)]
pub struct CaseExecution<'a> {
    method: &'a TestMethod,
    skip: Option<Skip>,
    state: CaseState,
    duration: Duration,
    output: Option<String>,
    failures: Option<CaseFailures>,
}

impl<'a> CaseExecution<'a> {
    pub(crate) fn new(method: &'a TestMethod) -> Self {
        Self {
            method,
            skip: None,
            state: CaseState::Pending,
            duration: Duration::ZERO,
            output: None,
            failures: None,
        }
    }

    /// Returns the case being run.
    pub fn case(&self) -> &'a Case {
        self.method.case()
    }

    /// Returns the case's identity.
    pub fn method_group(&self) -> &'a MethodGroup {
        self.method.case().method_group()
    }

    /// Returns the skip decision made for this case, if it is to be skipped.
    pub fn skip(&self) -> Option<&Skip> {
        self.skip.as_ref()
    }

    /// Returns the case's current state.
    pub fn state(&self) -> CaseState {
        self.state
    }

    /// Returns true if the case has reached a terminal outcome.
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Returns the failures recorded against this case so far.
    pub fn failures(&self) -> Option<&CaseFailures> {
        self.failures.as_ref()
    }

    /// Returns true if at least one failure has been recorded against this case.
    pub fn has_failed(&self) -> bool {
        self.failures.is_some()
    }

    /// Returns how long the case's invocation took.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Returns the output captured while the case ran, if it ran.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Records a failure against this case.
    ///
    /// The first failure recorded is the primary one; later failures are kept as secondary
    /// failures. Failures recorded after the case has completed are ignored.
    pub fn fail(&mut self, failure: Failure) {
        if self.is_completed() {
            return;
        }
        match &mut self.failures {
            Some(failures) => failures.push(failure),
            None => self.failures = Some(CaseFailures::new(failure)),
        }
    }

    pub(crate) fn set_skip(&mut self, skip: Option<Skip>) {
        self.skip = skip;
    }

    pub(crate) fn invoke(&self, instance: &mut dyn Fixture) -> Result<(), Failure> {
        self.method.invoke(instance)
    }
}

/// One class's run: its cases, in execution order, and the results published so far.
pub struct ClassExecution<'a> {
    class: &'a TestClass,
    cases: Vec<CaseExecution<'a>>,
    plan: &'a ExecutionPlan,
    sink: &'a mut dyn MessageSink,
    summary: ExecutionSummary,
    aborted: Option<WriteEventError>,
}

impl<'a> ClassExecution<'a> {
    pub(crate) fn new(
        class: &'a TestClass,
        methods: impl IntoIterator<Item = &'a TestMethod>,
        plan: &'a ExecutionPlan,
        sink: &'a mut dyn MessageSink,
    ) -> Self {
        Self {
            class,
            cases: methods.into_iter().map(CaseExecution::new).collect(),
            plan,
            sink,
            summary: ExecutionSummary::default(),
            aborted: None,
        }
    }

    /// Returns the class being run.
    pub fn class(&self) -> &'a TestClass {
        self.class
    }

    /// Returns the cases of this class, in execution order.
    pub fn cases(&self) -> &[CaseExecution<'a>] {
        &self.cases
    }

    /// Returns the number of cases selected to run in this class.
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Fails every case that has not completed yet with `failure`, and publishes the results.
    ///
    /// Cases that already completed keep their outcome, so calling this more than once never
    /// reports a case twice.
    pub fn fail_remaining_cases(&mut self, failure: Failure) {
        for index in 0..self.cases.len() {
            if !self.cases[index].is_completed() {
                self.fail_case(index, failure.clone());
            }
        }
    }

    pub(crate) fn cases_mut(&mut self) -> &mut [CaseExecution<'a>] {
        &mut self.cases
    }

    /// Returns true if a listener failed and no further messages will be published.
    ///
    /// Instance strategies stop running cases once this is true.
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Publishes a skip for the pending case at `index`.
    pub fn skip_case(&mut self, index: usize) {
        let case = &mut self.cases[index];
        if case.is_completed() {
            return;
        }
        case.state = CaseState::Skipped;
        self.summary.skipped += 1;
        let message = Message::CaseSkipped {
            method_group: case.method_group().clone(),
            reason: case.skip.as_ref().and_then(|skip| skip.reason().map(str::to_owned)),
        };
        debug!(case = %case.method_group(), "case skipped");
        self.publish(message);
    }

    /// Skips every pending case, using `default_reason` for cases without a skip decision.
    pub(crate) fn skip_remaining_cases(&mut self, default_reason: &str) {
        for index in 0..self.cases.len() {
            let case = &mut self.cases[index];
            if case.is_completed() {
                continue;
            }
            if case.skip.is_none() {
                case.skip = Some(Skip::with_reason(default_reason));
            }
            self.skip_case(index);
        }
    }

    /// Invokes the pending case at `index` against `instance` through the case behavior chain,
    /// measuring its duration and capturing its output.
    ///
    /// The result is not published until [`complete_case`](Self::complete_case) is called, so
    /// that a strategy can still record a disposal failure against the case.
    pub fn run_case(&mut self, index: usize, instance: &mut dyn Fixture) {
        let plan = self.plan;
        let case = &mut self.cases[index];
        if case.is_completed() {
            return;
        }

        trace!(case = %case.method_group(), "running case");
        let capture = OutputCapture::start_with(plan.output_capture());
        let stopwatch = Stopwatch::start();
        plan.case_behavior().execute(case, instance);
        case.duration = stopwatch.elapsed();
        case.output = Some(capture.finish().lossy().into_owned());
    }

    /// Records `failure` against the pending case at `index` and publishes its result.
    pub fn fail_case(&mut self, index: usize, failure: Failure) {
        self.cases[index].fail(failure);
        self.complete_case(index);
    }

    /// Publishes the result of the pending case at `index`: failed if any failure was recorded,
    /// passed otherwise.
    pub fn complete_case(&mut self, index: usize) {
        let case = &mut self.cases[index];
        if case.is_completed() {
            return;
        }

        let method_group = case.method_group().clone();
        let duration = case.duration;
        let output = case.output.clone().unwrap_or_default();
        let message = match &case.failures {
            Some(failures) => {
                case.state = CaseState::Failed;
                self.summary.failed += 1;
                debug!(case = %method_group, failure = %failures.primary(), "case failed");
                Message::CaseFailed {
                    method_group,
                    duration,
                    output,
                    failures: failures.clone(),
                }
            }
            None => {
                case.state = CaseState::Passed;
                self.summary.passed += 1;
                debug!(case = %method_group, ?duration, "case passed");
                Message::CasePassed {
                    method_group,
                    duration,
                    output,
                }
            }
        };
        self.publish(message);
    }

    /// Reports a failure that belongs to the class as a whole.
    pub(crate) fn report_class_failure(&mut self, failure: Failure) {
        warn!(class = %self.class.name(), %failure, "class-level failure");
        self.summary.class_failures += 1;
        self.publish(Message::ClassFailed {
            class: self.class.name().into(),
            failure,
        });
    }

    /// Publishes a message produced for this class, unless a listener already failed.
    pub(crate) fn publish(&mut self, message: Message) {
        if self.aborted.is_some() {
            return;
        }
        if let Err(error) = self.sink.publish(&message) {
            self.aborted = Some(error);
        }
    }

    /// Finishes the class, returning its statistics or the listener error that aborted it.
    pub(crate) fn finish(self) -> Result<ExecutionSummary, WriteEventError> {
        match self.aborted {
            Some(error) => Err(error),
            None => Ok(self.summary),
        }
    }
}

impl std::fmt::Debug for ClassExecution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassExecution")
            .field("class", &self.class.name())
            .field("cases", &self.cases)
            .field("summary", &self.summary)
            .field("aborted", &self.aborted)
            .finish_non_exhaustive()
    }
}
