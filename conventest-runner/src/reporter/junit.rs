// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from run messages.

use super::{
    bus::Listener,
    events::{Message, MessageKind},
};
use crate::{errors::WriteEventError, failure::Failure};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, FixedOffset};
use conventest_metadata::MethodGroup;
use debug_ignore::DebugIgnore;
use indexmap::IndexMap;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use smol_str::SmolStr;
use std::{fs::File, time::Duration};
use tracing::debug;

/// The test case name used to report a failure that belongs to a class rather than a case.
static CLASS_FAILURE_NAME: &str = "(class)";

/// Accumulates results per class, and writes them out as a JUnit XML report once the run
/// completes.
#[derive(Clone, Debug)]
pub struct JunitListener {
    path: Utf8PathBuf,
    started: Option<DateTime<FixedOffset>>,
    test_suites: DebugIgnore<IndexMap<SmolStr, TestSuite>>,
}

impl JunitListener {
    /// Creates a new listener that will write its report to `path`.
    ///
    /// Missing parent directories are created when the report is written.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            started: None,
            test_suites: DebugIgnore(IndexMap::new()),
        }
    }

    /// Returns the path the report is written to.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn testsuite_for(&mut self, class: &str) -> &mut TestSuite {
        self.test_suites
            .entry(SmolStr::new(class))
            .or_insert_with(|| TestSuite::new(class))
    }

    fn add_case(&mut self, method_group: &MethodGroup, mut testcase: TestCase) {
        testcase.set_classname(method_group.class());
        self.testsuite_for(method_group.class()).add_test_case(testcase);
    }

    fn write_report(&mut self, assembly: &str, time: Duration) -> Result<(), WriteEventError> {
        let mut report = Report::new(assembly);
        if let Some(started) = self.started {
            report.set_timestamp(started);
        }
        report
            .set_time(time)
            .add_test_suites(self.test_suites.drain(..).map(|(_, testsuite)| testsuite));

        if let Some(junit_dir) = self.path.parent() {
            std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
                file: junit_dir.to_path_buf(),
                error,
            })?;
        }

        let f = File::create(&self.path).map_err(|error| WriteEventError::Fs {
            file: self.path.clone(),
            error,
        })?;
        report
            .serialize(f)
            .map_err(|error| WriteEventError::Junit {
                file: self.path.clone(),
                error,
            })?;
        debug!(path = %self.path, "wrote JUnit report");
        Ok(())
    }
}

impl Listener for JunitListener {
    fn subscriptions(&self) -> &'static [MessageKind] {
        &[
            MessageKind::AssemblyStarted,
            MessageKind::CaseSkipped,
            MessageKind::CasePassed,
            MessageKind::CaseFailed,
            MessageKind::ClassFailed,
            MessageKind::AssemblyCompleted,
        ]
    }

    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError> {
        match message {
            Message::AssemblyStarted { timestamp, .. } => {
                self.started = Some(*timestamp);
                self.test_suites.clear();
            }
            Message::CaseSkipped {
                method_group,
                reason,
            } => {
                let mut status = TestCaseStatus::skipped();
                if let Some(reason) = reason {
                    status.set_message(reason.as_str());
                }
                self.add_case(method_group, TestCase::new(method_group.method(), status));
            }
            Message::CasePassed {
                method_group,
                duration,
                ..
            } => {
                let mut testcase = TestCase::new(method_group.method(), TestCaseStatus::success());
                testcase.set_time(*duration);
                self.add_case(method_group, testcase);
            }
            Message::CaseFailed {
                method_group,
                duration,
                output,
                failures,
            } => {
                let mut status = failure_status(NonSuccessKind::Failure, failures.primary());
                status.set_description(failures.compound_stack_trace());

                let mut testcase = TestCase::new(method_group.method(), status);
                testcase.set_time(*duration);
                if !output.is_empty() {
                    testcase.set_system_out(output.as_str());
                }
                self.add_case(method_group, testcase);
            }
            Message::ClassFailed { class, failure } => {
                let mut status = failure_status(NonSuccessKind::Error, failure);
                status.set_description(failure.typed_stack_trace());

                let mut testcase = TestCase::new(CLASS_FAILURE_NAME, status);
                testcase.set_classname(class.as_str());
                self.testsuite_for(class).add_test_case(testcase);
            }
            Message::AssemblyCompleted { assembly, summary } => {
                self.write_report(assembly, summary.duration)?;
            }
            _ => {}
        }

        Ok(())
    }
}

fn failure_status(kind: NonSuccessKind, failure: &Failure) -> TestCaseStatus {
    let mut status = TestCaseStatus::non_success(kind);
    status
        .set_message(failure.message())
        .set_type(failure.type_name());
    status
}
