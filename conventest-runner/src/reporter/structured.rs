// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The framed result stream consumed by IDE test explorers.
//!
//! Every discovered case is written as a [`Test`] record and every case result as a
//! [`TestResult`] record, one record per frame. See [`conventest_metadata::FrameWriter`] for the
//! framing.

use super::{
    bus::Listener,
    events::{Message, MessageKind},
};
use crate::errors::WriteEventError;
use conventest_metadata::{FrameWriter, MethodGroup, Test, TestOutcome, TestResult};
use std::{io::Write, time::Duration};

/// Writes discovery and result records to a framed stream.
///
/// Each record is flushed as soon as it is written, so a reader in another process sees results
/// while the run is still in progress.
#[derive(Debug)]
pub struct TestExplorerListener<W> {
    writer: FrameWriter<W>,
}

impl<W: Write> TestExplorerListener<W> {
    /// Creates a new listener writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: FrameWriter::new(writer),
        }
    }

    /// Consumes the listener, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn write_test(&mut self, method_group: &MethodGroup) -> Result<(), WriteEventError> {
        let full_name = method_group.full_name();
        self.writer
            .write_record(&Test {
                fully_qualified_name: full_name.clone(),
                display_name: full_name,
            })
            .map_err(WriteEventError::Frame)
    }

    fn write_result(&mut self, result: TestResult) -> Result<(), WriteEventError> {
        self.writer
            .write_record(&result)
            .map_err(WriteEventError::Frame)
    }
}

fn result_for(method_group: &MethodGroup, outcome: TestOutcome, duration: Duration) -> TestResult {
    let full_name = method_group.full_name();
    TestResult {
        fully_qualified_name: full_name.clone(),
        display_name: full_name,
        outcome,
        duration,
        output: None,
        error_message: None,
        error_stack_trace: None,
    }
}

impl<W: Write> Listener for TestExplorerListener<W> {
    fn subscriptions(&self) -> &'static [MessageKind] {
        &[
            MessageKind::MethodDiscovered,
            MessageKind::CaseSkipped,
            MessageKind::CasePassed,
            MessageKind::CaseFailed,
        ]
    }

    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError> {
        match message {
            Message::MethodDiscovered { method_group } => self.write_test(method_group),
            Message::CaseSkipped {
                method_group,
                reason,
            } => {
                let mut result = result_for(method_group, TestOutcome::Skipped, Duration::ZERO);
                result.error_message = reason.clone();
                self.write_result(result)
            }
            Message::CasePassed {
                method_group,
                duration,
                output,
            } => {
                let mut result = result_for(method_group, TestOutcome::Passed, *duration);
                result.output = Some(output.clone());
                self.write_result(result)
            }
            Message::CaseFailed {
                method_group,
                duration,
                output,
                failures,
            } => {
                let mut result = result_for(method_group, TestOutcome::Failed, *duration);
                result.output = Some(output.clone());
                result.error_message = Some(failures.primary().message().to_owned());
                result.error_stack_trace = Some(failures.compound_stack_trace());
                self.write_result(result)
            }
            _ => Ok(()),
        }
    }
}
