// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{failure::CaseFailures, failure::Failure, runner::ExecutionSummary};
use chrono::{DateTime, FixedOffset};
use conventest_metadata::MethodGroup;
use smol_str::SmolStr;
use std::time::Duration;

/// A message describing progress through discovery or a run.
///
/// Messages are produced by a [`TestRunner`](crate::runner::TestRunner) and delivered by the
/// [`Bus`](super::Bus) to every listener subscribed to their [`MessageKind`]. A message is an
/// immutable snapshot: listeners receive it by shared reference.
#[derive(Clone, Debug)]
pub enum Message {
    /// A case was found during discovery.
    MethodDiscovered {
        /// The case's identity.
        method_group: MethodGroup,
    },

    /// A run started.
    AssemblyStarted {
        /// The name of the assembly being run.
        assembly: String,

        /// The time the run started, including the offset from UTC.
        timestamp: DateTime<FixedOffset>,
    },

    /// A class started running.
    ClassStarted {
        /// The name of the class.
        class: SmolStr,

        /// The number of cases selected to run in this class.
        case_count: usize,
    },

    /// A case was skipped.
    CaseSkipped {
        /// The case's identity.
        method_group: MethodGroup,

        /// The reason the case was skipped, if one was given.
        reason: Option<String>,
    },

    /// A case passed.
    CasePassed {
        /// The case's identity.
        method_group: MethodGroup,

        /// How long the case's invocation took.
        duration: Duration,

        /// Output captured during the case's invocation.
        output: String,
    },

    /// A case failed.
    CaseFailed {
        /// The case's identity.
        method_group: MethodGroup,

        /// How long the case's invocation took. Zero if the case never ran.
        duration: Duration,

        /// Output captured during the case's invocation.
        output: String,

        /// The failures recorded against the case, primary first.
        failures: CaseFailures,
    },

    /// A class-level failure that no single case owns, such as a failure disposing an instance
    /// shared by every case in the class.
    ClassFailed {
        /// The name of the class.
        class: SmolStr,

        /// The failure.
        failure: Failure,
    },

    /// A class finished running.
    ClassCompleted {
        /// The name of the class.
        class: SmolStr,

        /// Statistics for the class.
        summary: ExecutionSummary,
    },

    /// A run finished.
    AssemblyCompleted {
        /// The name of the assembly that was run.
        assembly: String,

        /// Statistics for the run.
        summary: ExecutionSummary,
    },
}

impl Message {
    /// Returns the kind of this message.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::MethodDiscovered { .. } => MessageKind::MethodDiscovered,
            Self::AssemblyStarted { .. } => MessageKind::AssemblyStarted,
            Self::ClassStarted { .. } => MessageKind::ClassStarted,
            Self::CaseSkipped { .. } => MessageKind::CaseSkipped,
            Self::CasePassed { .. } => MessageKind::CasePassed,
            Self::CaseFailed { .. } => MessageKind::CaseFailed,
            Self::ClassFailed { .. } => MessageKind::ClassFailed,
            Self::ClassCompleted { .. } => MessageKind::ClassCompleted,
            Self::AssemblyCompleted { .. } => MessageKind::AssemblyCompleted,
        }
    }

    /// Returns the identity of the case this message is about, if it is about a single case.
    pub fn method_group(&self) -> Option<&MethodGroup> {
        match self {
            Self::MethodDiscovered { method_group }
            | Self::CaseSkipped { method_group, .. }
            | Self::CasePassed { method_group, .. }
            | Self::CaseFailed { method_group, .. } => Some(method_group),
            Self::AssemblyStarted { .. }
            | Self::ClassStarted { .. }
            | Self::ClassFailed { .. }
            | Self::ClassCompleted { .. }
            | Self::AssemblyCompleted { .. } => None,
        }
    }
}

/// The kind of a [`Message`], used to subscribe listeners.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MessageKind {
    /// [`Message::MethodDiscovered`].
    MethodDiscovered,
    /// [`Message::AssemblyStarted`].
    AssemblyStarted,
    /// [`Message::ClassStarted`].
    ClassStarted,
    /// [`Message::CaseSkipped`].
    CaseSkipped,
    /// [`Message::CasePassed`].
    CasePassed,
    /// [`Message::CaseFailed`].
    CaseFailed,
    /// [`Message::ClassFailed`].
    ClassFailed,
    /// [`Message::ClassCompleted`].
    ClassCompleted,
    /// [`Message::AssemblyCompleted`].
    AssemblyCompleted,
}

impl MessageKind {
    /// Every message kind.
    pub const ALL: &'static [MessageKind] = &[
        Self::MethodDiscovered,
        Self::AssemblyStarted,
        Self::ClassStarted,
        Self::CaseSkipped,
        Self::CasePassed,
        Self::CaseFailed,
        Self::ClassFailed,
        Self::ClassCompleted,
        Self::AssemblyCompleted,
    ];

    /// The kinds of message that record a case's terminal outcome.
    pub const CASE_RESULTS: &'static [MessageKind] =
        &[Self::CaseSkipped, Self::CasePassed, Self::CaseFailed];
}
