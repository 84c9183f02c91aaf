// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::xsd_duration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A test case found during discovery.
///
/// Written to the result stream once per discovered case. Field names are part of the wire
/// format and are serialized in `PascalCase`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Test {
    /// The full name of the case, `Class.Method`.
    pub fully_qualified_name: String,

    /// The name shown to users.
    pub display_name: String,
}

/// The result of running a single test case.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestResult {
    /// The full name of the case, `Class.Method`.
    pub fully_qualified_name: String,

    /// The name shown to users.
    pub display_name: String,

    /// The outcome of the case.
    pub outcome: TestOutcome,

    /// How long the case took to run. Zero for skipped cases.
    #[serde(with = "xsd_duration")]
    pub duration: Duration,

    /// Console output captured while the case ran. Null for skipped cases.
    pub output: Option<String>,

    /// The skip reason for skipped cases, or the failure message for failed cases.
    pub error_message: Option<String>,

    /// The failure's stack trace, for failed cases.
    pub error_stack_trace: Option<String>,
}

/// The outcome of a test case, as written to the result stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TestOutcome {
    /// The case passed.
    Passed,

    /// The case failed.
    Failed,

    /// The case was skipped.
    Skipped,
}

impl TestOutcome {
    /// Returns the literal wire name of this outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "Passed",
            Self::Failed => "Failed",
            Self::Skipped => "Skipped",
        }
    }
}
