// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable output for terminals.

use super::{
    bus::Listener,
    events::{Message, MessageKind},
};
use crate::{errors::WriteEventError, failure::CaseFailures, runner::ExecutionSummary};
use conventest_metadata::MethodGroup;
use owo_colors::{OwoColorize, Style};
use std::{fmt, io::Write, time::Duration};
use swrite::{SWrite, swrite};

/// Reports results in a form meant to be read by people.
///
/// Discovered cases are listed one per line. Every case result is printed on its own status
/// line. Failed cases are followed by their captured output and failures, and the run ends with a
/// summary line.
#[derive(Debug)]
pub struct ConsoleListener<W> {
    writer: W,
    styles: Styles,
}

impl<W: Write> ConsoleListener<W> {
    /// Creates a new listener writing uncolored output to `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            styles: Styles::default(),
        }
    }

    /// Colorizes the output of this listener.
    pub fn colorize(&mut self) -> &mut Self {
        self.styles.colorize();
        self
    }

    /// Consumes the listener, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_status_line(
        &mut self,
        status: &str,
        style: Style,
        duration: Option<Duration>,
        name: &dyn fmt::Display,
    ) -> std::io::Result<()> {
        write!(self.writer, "{:>12} ", status.style(style))?;
        match duration {
            Some(duration) => write!(self.writer, "{}", DisplayBracketedDuration(duration))?,
            // Keep names aligned with the timed lines.
            None => write!(self.writer, "{:12}", "")?,
        }
        write!(self.writer, "{name}")
    }

    fn write_failed(
        &mut self,
        method_group: &MethodGroup,
        duration: Duration,
        output: &str,
        failures: &CaseFailures,
    ) -> std::io::Result<()> {
        self.write_status_line("FAIL", self.styles.fail, Some(duration), method_group)?;
        writeln!(self.writer)?;

        if !output.is_empty() {
            self.write_section_header("OUTPUT", method_group)?;
            self.writer.write_all(output.as_bytes())?;
            if !output.ends_with('\n') {
                writeln!(self.writer)?;
            }
        }

        self.write_section_header("FAILURE", method_group)?;
        writeln!(
            self.writer,
            "{}",
            failures.primary().message().style(self.styles.fail)
        )?;
        writeln!(self.writer, "{}", failures.compound_stack_trace())?;
        writeln!(self.writer)
    }

    fn write_section_header(
        &mut self,
        section: &str,
        method_group: &MethodGroup,
    ) -> std::io::Result<()> {
        writeln!(
            self.writer,
            "{:>12} {}",
            format!("----- {section}:").style(self.styles.fail),
            method_group.style(self.styles.name),
        )
    }

    fn write_summary(&mut self, summary: &ExecutionSummary) -> std::io::Result<()> {
        let summary_style = if summary.total() == 0 {
            self.styles.skip
        } else if summary.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        writeln!(self.writer, "{}", "-".repeat(12))?;
        write!(self.writer, "{:>12} ", "Summary".style(summary_style))?;
        write!(self.writer, "{}", DisplayBracketedDuration(summary.duration))?;

        let cases_str = if summary.total() == 1 {
            "case"
        } else {
            "cases"
        };
        writeln!(
            self.writer,
            "{} {cases_str} run: {}",
            summary.total().style(self.styles.count),
            summary_str(summary, &self.styles),
        )
    }
}

impl<W: Write> Listener for ConsoleListener<W> {
    fn subscriptions(&self) -> &'static [MessageKind] {
        &[
            MessageKind::MethodDiscovered,
            MessageKind::CaseSkipped,
            MessageKind::CasePassed,
            MessageKind::CaseFailed,
            MessageKind::ClassFailed,
            MessageKind::AssemblyCompleted,
        ]
    }

    fn handle(&mut self, message: &Message) -> Result<(), WriteEventError> {
        let res = match message {
            Message::MethodDiscovered { method_group } => {
                writeln!(self.writer, "{}", method_group.style(self.styles.name))
            }
            Message::CaseSkipped {
                method_group,
                reason,
            } => self
                .write_status_line("SKIP", self.styles.skip, None, method_group)
                .and_then(|()| match reason {
                    Some(reason) => writeln!(self.writer, ": {reason}"),
                    None => writeln!(self.writer),
                }),
            Message::CasePassed {
                method_group,
                duration,
                ..
            } => self
                .write_status_line("PASS", self.styles.pass, Some(*duration), method_group)
                .and_then(|()| writeln!(self.writer)),
            Message::CaseFailed {
                method_group,
                duration,
                output,
                failures,
            } => self.write_failed(method_group, *duration, output, failures),
            Message::ClassFailed { class, failure } => self
                .write_status_line("ERROR", self.styles.fail, None, class)
                .and_then(|()| {
                    writeln!(self.writer, ": {}", failure.message())?;
                    writeln!(self.writer, "{}", failure.typed_stack_trace())
                }),
            Message::AssemblyCompleted { summary, .. } => self.write_summary(summary),
            _ => Ok(()),
        };
        res.and_then(|()| self.writer.flush())
            .map_err(WriteEventError::Io)
    }
}

fn summary_str(summary: &ExecutionSummary, styles: &Styles) -> String {
    let mut out = String::new();
    swrite!(
        out,
        "{} {}",
        summary.passed.style(styles.count),
        "passed".style(styles.pass)
    );
    if summary.failed > 0 {
        swrite!(
            out,
            ", {} {}",
            summary.failed.style(styles.count),
            "failed".style(styles.fail)
        );
    }
    if summary.skipped > 0 {
        swrite!(
            out,
            ", {} {}",
            summary.skipped.style(styles.count),
            "skipped".style(styles.skip)
        );
    }
    if summary.class_failures > 0 {
        let label = if summary.class_failures == 1 {
            "class failure"
        } else {
            "class failures"
        };
        swrite!(
            out,
            ", {} {}",
            summary.class_failures.style(styles.count),
            label.style(styles.fail)
        );
    }
    out
}

struct DisplayBracketedDuration(Duration);

impl fmt::Display for DisplayBracketedDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Right-aligned to 8 characters, with three digits after the decimal point.
        write!(f, "[{:>8.3?}s] ", self.0.as_secs_f64())
    }
}

#[derive(Clone, Debug, Default)]
struct Styles {
    count: Style,
    name: Style,
    pass: Style,
    fail: Style,
    skip: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.name = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.skip = Style::new().yellow().bold();
    }
}
