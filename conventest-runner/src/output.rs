// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Colors and logging for the harness.

use clap::ValueEnum;
use owo_colors::{OwoColorize, Style, style};
use std::{fmt, sync::Once};
use swrite::{SWrite, swrite};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
    warn,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable used to filter conventest's own log output.
pub const LOG_ENV: &str = "CONVENTEST_LOG";

/// Whether to colorize console and log output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub enum Color {
    /// Colorize when the stream supports it and `NO_COLOR` is unset.
    #[default]
    Auto,

    /// Always colorize.
    Always,

    /// Never colorize.
    Never,
}

impl Color {
    /// Initializes logging to stderr.
    ///
    /// Log output is filtered by the `CONVENTEST_LOG` environment variable, which takes the
    /// `tracing-subscriber` targets syntax. Warnings and errors are shown by default. Only the
    /// first call has any effect.
    pub fn init(self) {
        INIT_LOGGER.call_once(|| {
            let mut log_styles = LogStyles::default();
            if self.should_colorize(supports_color::Stream::Stderr) {
                log_styles.colorize();
            }

            let level_str = std::env::var(LOG_ENV).unwrap_or_default();
            let (targets, parse_error) = if level_str.is_empty() {
                (Targets::new().with_default(LevelFilter::WARN), None)
            } else {
                match level_str.parse::<Targets>() {
                    Ok(targets) => (targets, None),
                    Err(error) => (Targets::new().with_default(LevelFilter::WARN), Some(error)),
                }
            };

            let layer = tracing_subscriber::fmt::layer()
                .event_format(LogFormatter { styles: log_styles })
                .with_writer(std::io::stderr)
                .with_filter(targets);
            // Another subscriber may already be installed, for example by a test harness.
            let _ = tracing_subscriber::registry().with(layer).try_init();

            if let Some(error) = parse_error {
                warn!("ignoring invalid {LOG_ENV} value `{level_str}`: {error}");
            }
        });
    }

    /// Returns true if output written to `stream` should be colorized.
    pub fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

/// Formats log events as `level: message`, followed by the event's fields at debug and trace
/// levels.
struct LogFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for LogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = *event.metadata().level();
        let (label, style) = self.styles.for_level(level);

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        write!(writer, "{}: {}", label.style(style), fields.message)?;
        if level >= Level::DEBUG && !fields.rest.is_empty() {
            write!(writer, " ({})", fields.rest)?;
        }
        writeln!(writer)
    }
}

/// Splits an event's fields into its message and everything else.
#[derive(Default)]
struct FieldCollector {
    message: String,
    rest: String,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            swrite!(self.message, "{value:?}");
            return;
        }
        if !self.rest.is_empty() {
            self.rest.push_str(", ");
        }
        swrite!(self.rest, "{} = {value:?}", field.name());
    }
}

static INIT_LOGGER: Once = Once::new();

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    detail: Style,
    trace: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.detail = style().bold();
        self.trace = style().dimmed();
    }

    fn for_level(&self, level: Level) -> (&'static str, Style) {
        match level {
            Level::ERROR => ("error", self.error),
            Level::WARN => ("warning", self.warning),
            Level::INFO => ("info", self.detail),
            Level::DEBUG => ("debug", self.detail),
            Level::TRACE => ("trace", self.trace),
        }
    }
}
