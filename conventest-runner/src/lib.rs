// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for conventest, a convention-based test runner.
//!
//! Test classes are described as a [`TestAssembly`](list::TestAssembly). A
//! [`Convention`](convention::Convention) decides how their instances are created and how each
//! case is invoked, and a [`TestRunner`](runner::TestRunner) drives every class through that
//! convention, publishing results to the listeners in [`reporter`].
//!
//! # Examples
//!
//! ```
//! use conventest_runner::{
//!     convention::Convention,
//!     failure::Failure,
//!     list::{Fixture, TestAssembly, TestClass},
//!     reporter::{Bus, Message, MessageKind},
//!     runner::TestRunner,
//! };
//!
//! #[derive(Default)]
//! struct SampleTestClass;
//!
//! impl Fixture for SampleTestClass {}
//!
//! let assembly = TestAssembly::new("sample").with_class(
//!     TestClass::builder::<SampleTestClass>("SampleTestClass")
//!         .default_constructor()
//!         .case("Pass", |_| Ok(()))
//!         .case("Fail", |_| Err(Failure::new("'Fail' failed!")))
//!         .build(),
//! );
//!
//! let mut convention = Convention::default();
//! convention.class_execution.create_instance_per_class();
//! let runner = TestRunner::new(convention.build());
//!
//! let mut failed = Vec::new();
//! let mut bus = Bus::new();
//! bus.subscribe_fn(MessageKind::CaseFailed, |message| {
//!     if let Message::CaseFailed { method_group, .. } = message {
//!         failed.push(method_group.to_string());
//!     }
//!     Ok(())
//! });
//!
//! let summary = runner.run_assembly(&assembly, &mut bus).unwrap();
//! drop(bus);
//! assert_eq!((summary.passed, summary.failed), (1, 1));
//! assert_eq!(failed, ["SampleTestClass.Fail"]);
//! ```

#[macro_use]
mod macros;

pub mod behavior;
pub mod config;
pub mod convention;
pub mod errors;
pub mod execution;
pub mod failure;
pub mod harness;
pub mod list;
pub mod output;
pub mod reporter;
pub mod runner;
mod stopwatch;
pub mod test_output;
