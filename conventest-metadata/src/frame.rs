// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The framed result stream.
//!
//! The result stream is a sequence of frames. Each frame is a UTF-8 string prefixed by its length
//! in bytes, and each string holds one JSON-encoded record ([`Test`](crate::Test) or
//! [`TestResult`](crate::TestResult)).
//!
//! The length prefix is a 7-bit variable-length integer: the low seven bits of each byte carry
//! the value, least significant group first, and the high bit is set on every byte except the
//! last. Lengths are limited to `i32::MAX` so the prefix is at most five bytes long.
//!
//! There is no checksum and no resynchronization: a malformed frame is a protocol violation.

use crate::errors::{FrameReadError, FrameWriteError};
use serde::{Serialize, de::DeserializeOwned};
use std::io::{self, Read, Write};

/// The maximum length of a single frame, in bytes.
pub const MAX_FRAME_LEN: usize = i32::MAX as usize;

const MAX_PREFIX_BYTES: usize = 5;

/// Writes frames to a result stream, flushing after every frame.
///
/// Flushing per frame lets a reader in another process observe records as they are produced,
/// rather than only when the stream is closed.
#[derive(Debug)]
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new frame writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serializes `record` as JSON and writes it as a single frame.
    pub fn write_record<T: Serialize>(&mut self, record: &T) -> Result<(), FrameWriteError> {
        let json = serde_json::to_string(record).map_err(FrameWriteError::Json)?;
        self.write_frame(&json)
    }

    /// Writes a single frame containing `payload`, then flushes.
    pub fn write_frame(&mut self, payload: &str) -> Result<(), FrameWriteError> {
        let len = payload.len();
        if len > MAX_FRAME_LEN {
            return Err(FrameWriteError::TooLong {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        let mut prefix = [0u8; MAX_PREFIX_BYTES];
        let prefix_len = encode_length(len, &mut prefix);
        self.writer
            .write_all(&prefix[..prefix_len])
            .and_then(|()| self.writer.write_all(payload.as_bytes()))
            .and_then(|()| self.writer.flush())
            .map_err(FrameWriteError::Io)
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the frame writer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Reads frames from a result stream.
#[derive(Debug)]
pub struct FrameReader<R> {
    reader: R,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new frame reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next frame.
    ///
    /// Returns `Ok(None)` if the stream ended cleanly between frames.
    pub fn read_frame(&mut self) -> Result<Option<String>, FrameReadError> {
        let Some(len) = self.read_length()? else {
            return Ok(None);
        };

        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(FrameReadError::Truncated {
                        expected: len - filled,
                    });
                }
                Ok(n) => filled += n,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(FrameReadError::Io(error)),
            }
        }

        String::from_utf8(buf).map(Some).map_err(FrameReadError::Utf8)
    }

    /// Reads the next frame and deserializes it as a JSON record.
    ///
    /// Returns `Ok(None)` if the stream ended cleanly between frames.
    pub fn read_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, FrameReadError> {
        match self.read_frame()? {
            Some(frame) => serde_json::from_str(&frame)
                .map(Some)
                .map_err(FrameReadError::Json),
            None => Ok(None),
        }
    }

    /// Reads every remaining record until the end of the stream.
    pub fn read_to_end<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, FrameReadError> {
        let mut records = Vec::new();
        while let Some(record) = self.read_record()? {
            records.push(record);
        }
        Ok(records)
    }

    fn read_length(&mut self) -> Result<Option<usize>, FrameReadError> {
        let mut value: usize = 0;
        for index in 0..MAX_PREFIX_BYTES {
            let Some(byte) = self.read_byte()? else {
                return if index == 0 {
                    Ok(None)
                } else {
                    Err(FrameReadError::Truncated { expected: 1 })
                };
            };
            value |= usize::from(byte & 0x7f) << (7 * index);
            if byte & 0x80 == 0 {
                if value > MAX_FRAME_LEN {
                    return Err(FrameReadError::LengthOverflow);
                }
                return Ok(Some(value));
            }
        }
        Err(FrameReadError::LengthOverflow)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, FrameReadError> {
        let mut byte = [0u8; 1];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(FrameReadError::Io(error)),
            }
        }
    }
}

fn encode_length(mut len: usize, out: &mut [u8; MAX_PREFIX_BYTES]) -> usize {
    let mut written = 0;
    while len >= 0x80 {
        out[written] = (len as u8 & 0x7f) | 0x80;
        len >>= 7;
        written += 1;
    }
    out[written] = len as u8;
    written + 1
}
