// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Report the results of discovery and runs in human and machine-readable formats.
//!
//! Results leave the runner only as [`Message`]s published to a [`Bus`]. The listeners in this
//! module turn those messages into output:
//!
//! * [`ConsoleListener`]: human-readable output for terminals.
//! * [`TeamCityListener`]: TeamCity service messages.
//! * [`TestExplorerListener`]: the framed result stream consumed by IDE test explorers.
//! * [`JunitListener`]: a JUnit XML report written at the end of a run.
//! * [`AppVeyorListener`]: results posted to the AppVeyor build worker API.

mod appveyor;
mod bus;
mod console;
mod events;
mod junit;
mod structured;
mod teamcity;

pub use appveyor::*;
pub use bus::*;
pub use console::*;
pub use events::*;
pub use junit::*;
pub use structured::*;
pub use teamcity::*;
