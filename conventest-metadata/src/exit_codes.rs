// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for conventest harness failures.
///
/// A conventest harness may fail for a variety of reasons. This structure documents the exit
/// codes that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum ConventestExitCode {}

impl ConventestExitCode {
    /// No errors occurred and every case that ran either passed or was skipped.
    pub const OK: i32 = 0;

    /// No cases were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a run: bad arguments or configuration.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more cases failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Writing results to a listener's output produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
