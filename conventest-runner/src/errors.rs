// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by conventest.
//!
//! Failures raised by test code are not errors in this sense: they are contained within the class
//! that produced them and reported as [`Failure`](crate::failure::Failure) values. The errors here
//! are the ones that abort a run or prevent it from starting.

use camino::Utf8PathBuf;
use config::ConfigError;
use conventest_metadata::{FrameWriteError, MethodGroupParseError};
use std::{error, fmt};
use thiserror::Error;

/// The runner configuration could not be loaded.
#[derive(Debug, Error)]
#[error("failed to parse conventest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigError,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigError) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file that failed to parse.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }
}

/// An error that occurs while a listener handles a message.
///
/// These are the only errors allowed to escape a run: a listener that can no longer write its
/// output cannot report any further results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// The listener's writer failed.
    #[error("failed to write listener output")]
    Io(#[source] std::io::Error),

    /// An error occurred while writing a frame to the result stream.
    #[error("failed to write to result stream")]
    Frame(#[source] FrameWriteError),

    /// A file system operation on a report path failed.
    #[error("failed to access {file}")]
    Fs {
        /// The path that could not be accessed.
        file: Utf8PathBuf,

        /// The error returned by the file system.
        #[source]
        error: std::io::Error,
    },

    /// The JUnit report could not be serialized.
    #[error("failed to write JUnit report to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },

    /// A result could not be posted to the AppVeyor build worker API.
    #[error("failed to post test result to {url}")]
    AppVeyor {
        /// The endpoint the result was posted to.
        url: String,

        /// The underlying error.
        #[source]
        error: Box<ureq::Error>,
    },
}

/// An error that occurs while setting up or running a harness.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// The configuration could not be read.
    #[error(transparent)]
    Config(#[from] ConfigParseError),

    /// A method name passed to `run-methods` was invalid.
    #[error("invalid method name")]
    MethodGroup(#[from] MethodGroupParseError),

    /// An output file for a listener could not be created.
    #[error("error creating output file {file}")]
    CreateOutput {
        /// The file that could not be created.
        file: Utf8PathBuf,

        /// The error returned by the file system.
        #[source]
        error: std::io::Error,
    },

    /// A listener failed while the run was in progress.
    #[error("error reporting results")]
    WriteEvent(#[from] WriteEventError),
}

/// Displays an error along with the chain of errors that caused it.
///
/// The top-level message is printed first, followed by one `caused by:` entry per source.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain` for the given error.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E> fmt::Display for DisplayErrorChain<E>
where
    E: error::Error,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\ncaused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
