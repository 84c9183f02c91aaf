// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to conventest machine-readable output.
//!
//! A conventest run can stream its discovery and result records to another process, such as an
//! IDE test explorer. This crate contains the record types, the frame codec used for that stream,
//! and the [`MethodGroup`] identity that ties a record back to a test case.
//!
//! # Examples
//!
//! Reading every result from a stream:
//!
//! ```
//! use conventest_metadata::{FrameReader, FrameWriter, TestOutcome, TestResult};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = FrameWriter::new(Vec::new());
//! writer.write_record(&TestResult {
//!     fully_qualified_name: "SampleTestClass.Pass".to_owned(),
//!     display_name: "SampleTestClass.Pass".to_owned(),
//!     outcome: TestOutcome::Passed,
//!     duration: Duration::from_millis(3),
//!     output: Some(String::new()),
//!     error_message: None,
//!     error_stack_trace: None,
//! })?;
//!
//! let bytes = writer.into_inner();
//! let mut reader = FrameReader::new(bytes.as_slice());
//! let results: Vec<TestResult> = reader.read_to_end()?;
//! assert_eq!(results[0].outcome, TestOutcome::Passed);
//! # Ok(()) }
//! ```

mod duration;
mod errors;
mod exit_codes;
mod frame;
mod method_group;
mod records;

pub use duration::{format_duration, parse_duration, xsd_duration};
pub use errors::*;
pub use exit_codes::*;
pub use frame::*;
pub use method_group::*;
pub use records::*;
