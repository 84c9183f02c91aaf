// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TeamCity service messages.
//!
//! Each message is a single line of the form `##teamcity[name key='value' ...]`. Values are
//! escaped with TeamCity's `|` scheme so that they never span lines.

use super::{
    bus::Listener,
    events::{Message, MessageKind},
};
use crate::errors::WriteEventError;
use std::{io::Write, time::Duration};

/// Reports results as TeamCity service messages.
#[derive(Debug)]
pub struct TeamCityListener<W> {
    writer: W,
}

impl<W: Write> TeamCityListener<W> {
    /// Creates a new listener writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the listener, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn message(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<(), WriteEventError> {
        let mut line = format!("##teamcity[{name}");
        for (key, value) in attributes {
            line.push(' ');
            line.push_str(key);
            line.push_str("='");
            line.push_str(&escape(value));
            line.push('\'');
        }
        line.push(']');
        writeln!(self.writer, "{line}").map_err(WriteEventError::Io)
    }

    fn output(&mut self, name: &str, output: &str) -> Result<(), WriteEventError> {
        if output.is_empty() {
            return Ok(());
        }
        self.message("testStdOut", &[("name", name), ("out", output)])
    }
}

impl<W: Write> Listener for TeamCityListener<W> {
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
            Message::AssemblyStarted { assembly, .. } => {
                self.message("testSuiteStarted", &[("name", assembly.as_str())])
            }
            Message::CaseSkipped {
                method_group,
                reason,
            } => {
                let name = method_group.full_name();
                self.message(
                    "testIgnored",
                    &[
                        ("name", name.as_str()),
                        ("message", reason.as_deref().unwrap_or("")),
                    ],
                )
            }
            Message::CasePassed {
                method_group,
                duration,
                output,
            } => {
                let name = method_group.full_name();
                self.message("testStarted", &[("name", name.as_str())])?;
                self.output(&name, output)?;
                self.message(
                    "testFinished",
                    &[
                        ("name", name.as_str()),
                        ("duration", duration_millis(*duration).as_str()),
                    ],
                )
            }
            Message::CaseFailed {
                method_group,
                duration,
                output,
                failures,
            } => {
                let name = method_group.full_name();
                self.message("testStarted", &[("name", name.as_str())])?;
                self.output(&name, output)?;
                self.message(
                    "testFailed",
                    &[
                        ("name", name.as_str()),
                        ("message", failures.primary().message()),
                        ("details", failures.compound_stack_trace().as_str()),
                    ],
                )?;
                self.message(
                    "testFinished",
                    &[
                        ("name", name.as_str()),
                        ("duration", duration_millis(*duration).as_str()),
                    ],
                )
            }
            Message::ClassFailed { class, failure } => self.message(
                "message",
                &[
                    ("text", format!("{class}: {}", failure.message()).as_str()),
                    ("errorDetails", failure.typed_stack_trace().as_str()),
                    ("status", "ERROR"),
                ],
            ),
            Message::AssemblyCompleted { assembly, .. } => {
                self.message("testSuiteFinished", &[("name", assembly.as_str())])
            }
            _ => Ok(()),
        }
    }
}

/// Escapes a value for use inside a TeamCity service message.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '|' => out.push_str("||"),
            '\'' => out.push_str("|'"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            '\u{0085}' => out.push_str("|x"),
            '\u{2028}' => out.push_str("|l"),
            '\u{2029}' => out.push_str("|p"),
            ch => out.push(ch),
        }
    }
    out
}

/// Formats a duration in whole milliseconds, rounded up.
fn duration_millis(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    nanos.div_ceil(1_000_000).to_string()
}
