// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporting case results to the AppVeyor build worker API.
//!
//! On AppVeyor, every build worker runs a local HTTP API whose base URL is published in the
//! `APPVEYOR_API_URL` environment variable. Posting to its `api/tests` endpoint adds a row to
//! the build's "Tests" tab.

use super::{
    bus::Listener,
    events::{Message, MessageKind},
};
use crate::errors::WriteEventError;
use conventest_metadata::MethodGroup;
use serde::Serialize;
use std::time::Duration;
use tracing::trace;

/// The framework name reported for every result.
static TEST_FRAMEWORK: &str = "conventest";

/// The outcome of a test, as AppVeyor names it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
pub enum AppVeyorOutcome {
    /// The case passed.
    Passed,
    /// The case, or its class, failed.
    Failed,
    /// The case was skipped.
    Skipped,
}

/// One test result, in the shape the `api/tests` endpoint accepts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVeyorTest {
    /// The full name of the case.
    pub test_name: String,

    /// The name of the framework that ran the case.
    pub test_framework: String,

    /// The assembly the case belongs to.
    pub file_name: String,

    /// The outcome.
    pub outcome: AppVeyorOutcome,

    /// The duration, in whole milliseconds.
    pub duration_milliseconds: String,

    /// The primary failure message, or the skip reason.
    #[serde(rename = "ErrorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// The failure's stack trace.
    #[serde(rename = "ErrorStackTrace", skip_serializing_if = "Option::is_none")]
    pub error_stack_trace: Option<String>,

    /// The output captured while the case ran.
    #[serde(rename = "StdOut", skip_serializing_if = "Option::is_none")]
    pub std_out: Option<String>,
}

/// Somewhere to send [`AppVeyorTest`] results.
pub trait AppVeyorApi {
    /// Adds one test result to the build.
    fn add_test(&mut self, test: &AppVeyorTest) -> Result<(), WriteEventError>;
}

/// The build worker API, reached over HTTP.
#[derive(Debug)]
pub struct BuildWorkerApi {
    agent: ureq::Agent,
    url: String,
}

impl BuildWorkerApi {
    /// Creates a client for the API at `base_url`, usually the value of `APPVEYOR_API_URL`.
    pub fn new(base_url: &str) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            url: format!("{}/api/tests", base_url.trim_end_matches('/')),
        }
    }

    /// Returns the endpoint results are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AppVeyorApi for BuildWorkerApi {
    fn add_test(&mut self, test: &AppVeyorTest) -> Result<(), WriteEventError> {
        let body = serde_json::to_string(test).map_err(|error| WriteEventError::Io(error.into()))?;
        self.agent
            .post(self.url.as_str())
            .header("Content-Type", "application/json")
            .send(body.as_str())
            .map_err(|error| WriteEventError::AppVeyor {
                url: self.url.clone(),
                error: Box::new(error),
            })?;
        Ok(())
    }
}

/// Posts every case result, and every class-level failure, to an [`AppVeyorApi`].
///
/// This is added next to the primary listener when running on AppVeyor, so that results show up
/// in the build's "Tests" tab as well as in the log.
#[derive(Debug)]
pub struct AppVeyorListener<A = BuildWorkerApi> {
    api: A,
    file_name: String,
}

impl AppVeyorListener {
    /// Creates a listener posting to the build worker API at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self::with_api(BuildWorkerApi::new(base_url))
    }
}

impl<A: AppVeyorApi> AppVeyorListener<A> {
    /// Creates a listener posting to `api`.
    pub fn with_api(api: A) -> Self {
        Self {
            api,
            file_name: String::new(),
        }
    }

    /// Consumes the listener, returning the API it posts to.
    pub fn into_api(self) -> A {
        self.api
    }

    fn test(&self, name: String, outcome: AppVeyorOutcome, duration: Duration) -> AppVeyorTest {
        AppVeyorTest {
            test_name: name,
            test_framework: TEST_FRAMEWORK.to_owned(),
            file_name: self.file_name.clone(),
            outcome,
            duration_milliseconds: duration.as_millis().to_string(),
            error_message: None,
            error_stack_trace: None,
            std_out: None,
        }
    }

    fn post(&mut self, test: AppVeyorTest) -> Result<(), WriteEventError> {
        trace!(test = %test.test_name, outcome = ?test.outcome, "posting result to AppVeyor");
        self.api.add_test(&test)
    }
}

fn non_empty(output: &str) -> Option<String> {
    (!output.is_empty()).then(|| output.to_owned())
}

fn name(method_group: &MethodGroup) -> String {
    method_group.to_string()
}

impl<A: AppVeyorApi> Listener for AppVeyorListener<A> {
    fn subscriptions(&self) -> &'static [MessageKind] {
        &[
            MessageKind::AssemblyStarted,
            MessageKind::CaseSkipped,
            MessageKind::CasePassed,
            MessageKind::CaseFailed,
            MessageKind::ClassFailed,
        ]
    }

    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError> {
        match message {
            Message::AssemblyStarted { assembly, .. } => {
                self.file_name = assembly.clone();
                Ok(())
            }
            Message::CaseSkipped {
                method_group,
                reason,
            } => {
                let mut test = self.test(
                    name(method_group),
                    AppVeyorOutcome::Skipped,
                    Duration::ZERO,
                );
                test.error_message = reason.clone();
                self.post(test)
            }
            Message::CasePassed {
                method_group,
                duration,
                output,
            } => {
                let mut test = self.test(name(method_group), AppVeyorOutcome::Passed, *duration);
                test.std_out = non_empty(output);
                self.post(test)
            }
            Message::CaseFailed {
                method_group,
                duration,
                output,
                failures,
            } => {
                let mut test = self.test(name(method_group), AppVeyorOutcome::Failed, *duration);
                test.error_message = Some(failures.primary().message().to_owned());
                test.error_stack_trace = Some(failures.compound_stack_trace());
                test.std_out = non_empty(output);
                self.post(test)
            }
            Message::ClassFailed { class, failure } => {
                let mut test =
                    self.test(class.to_string(), AppVeyorOutcome::Failed, Duration::ZERO);
                test.error_message = Some(failure.message().to_owned());
                test.error_stack_trace = Some(failure.typed_stack_trace());
                self.post(test)
            }
            _ => Ok(()),
        }
    }
}
