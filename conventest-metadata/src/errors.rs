// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while encoding or decoding conventest machine-readable data.

use thiserror::Error;

/// An error that occurs while parsing a [`MethodGroup`](crate::MethodGroup) from its full name.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invalid method group `{input}`: {reason}")]
pub struct MethodGroupParseError {
    input: String,
    reason: &'static str,
}

impl MethodGroupParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }

    /// Returns the input that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// An error that occurs while parsing a duration in XML schema format (`PT1.5S`).
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("invalid duration `{input}`: {reason}")]
pub struct DurationParseError {
    input: String,
    reason: &'static str,
}

impl DurationParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// An error that occurs while writing a frame to the result stream.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameWriteError {
    /// The record could not be serialized to JSON.
    #[error("error serializing record to JSON")]
    Json(#[source] serde_json::Error),

    /// The frame is longer than the length prefix can describe.
    #[error("frame of {len} bytes exceeds the maximum frame length of {max} bytes")]
    TooLong {
        /// The length of the frame.
        len: usize,

        /// The maximum supported length.
        max: usize,
    },

    /// An error occurred while writing to the underlying stream.
    #[error("error writing frame to stream")]
    Io(#[source] std::io::Error),
}

/// An error that occurs while reading a frame from the result stream.
///
/// All variants other than [`Self::Io`] indicate a protocol violation: the stream was not
/// produced by a conforming writer, and reading cannot continue.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrameReadError {
    /// An error occurred while reading from the underlying stream.
    #[error("error reading frame from stream")]
    Io(#[source] std::io::Error),

    /// The stream ended partway through a frame.
    #[error("stream ended in the middle of a frame (expected {expected} more bytes)")]
    Truncated {
        /// The number of bytes still expected.
        expected: usize,
    },

    /// The length prefix was malformed or too large.
    #[error("malformed frame length prefix")]
    LengthOverflow,

    /// The frame payload was not valid UTF-8.
    #[error("frame payload is not valid UTF-8")]
    Utf8(#[source] std::string::FromUtf8Error),

    /// The frame payload was not the expected JSON record.
    #[error("frame payload is not a valid record")]
    Json(#[source] serde_json::Error),
}
