// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavior chains: how classes and cases are executed.
//!
//! A class is executed by a chain of [`ClassBehavior`]s. The innermost behavior is an instance
//! lifecycle strategy ([`CreateInstancePerCase`] or [`CreateInstancePerClass`]) that constructs
//! instances and runs each case; zero or more wrapping behaviors, registered with
//! [`ClassBehaviorBuilder::wrap`], surround it. Each case is in turn run through a chain of
//! [`CaseBehavior`]s around the case body itself.
//!
//! Wrapping behaviors execute in registration order, each nested inside the previous one: the
//! first wrap registered is the outermost.

mod case;
mod class;
mod lifecycle;
mod order;

pub use case::*;
pub use class::*;
pub use lifecycle::*;
pub use order::*;
