// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Timing for cases, classes and whole runs.
//!
//! Reports need both the wall-clock time a run started at and how long it took. The former comes
//! from `chrono`, the latter from a monotonic `Instant`, so durations are never affected by
//! changes to the system clock.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

/// A running timer, started when it is created.
#[derive(Clone, Debug)]
pub(crate) struct Stopwatch {
    started_at: DateTime<Local>,
    instant: Instant,
}

impl Stopwatch {
    pub(crate) fn start() -> Self {
        Self {
            started_at: Local::now(),
            instant: Instant::now(),
        }
    }

    /// The wall-clock time the stopwatch was started at.
    pub(crate) fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Time elapsed since the stopwatch was started.
    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }
}
