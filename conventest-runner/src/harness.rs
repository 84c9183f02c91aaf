// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A ready-made `main` for test targets built with `harness = false`.
//!
//! ```toml
//! [[test]]
//! name = "conventions"
//! harness = false
//! ```
//!
//! ```no_run
//! use conventest_runner::list::{Fixture, TestAssembly, TestClass};
//!
//! #[derive(Default)]
//! struct SampleTestClass;
//!
//! impl Fixture for SampleTestClass {}
//!
//! fn main() {
//!     let assembly = TestAssembly::new("conventions").with_class(
//!         TestClass::builder::<SampleTestClass>("SampleTestClass")
//!             .default_constructor()
//!             .case("Pass", |_| Ok(()))
//!             .build(),
//!     );
//!     conventest_runner::harness::main(assembly);
//! }
//! ```

use crate::{
    config::{CiEnvironment, ListenerSelection, PrimaryListener, RunnerConfig},
    convention::Convention,
    errors::{DisplayErrorChain, HarnessError},
    list::TestAssembly,
    output::Color,
    reporter::{
        AppVeyorListener, Bus, ConsoleListener, JunitListener, Listener, TeamCityListener,
        TestExplorerListener,
    },
    runner::{ExecutionSummary, TestRunner},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use conventest_metadata::{ConventestExitCode, MethodGroup};
use std::{fs::File, io::BufWriter};
use tracing::{debug, error};

/// Runs `assembly` with the default convention, then exits the process.
pub fn main(assembly: TestAssembly) -> ! {
    main_with_convention(assembly, Convention::default())
}

/// Runs `assembly` with `convention`, then exits the process.
///
/// Command-line arguments are parsed as [`HarnessOpts`]. The exit code is one of the codes
/// documented on [`ConventestExitCode`].
pub fn main_with_convention(assembly: TestAssembly, convention: Convention) -> ! {
    main_with_listeners(assembly, convention, Vec::new())
}

/// Runs `assembly` with `convention`, reporting to `listeners`, then exits the process.
///
/// If `listeners` is not empty, it replaces the listeners the harness would otherwise choose
/// from its configuration and environment. See [`HarnessOpts::exec_with_listeners`].
pub fn main_with_listeners(
    assembly: TestAssembly,
    convention: Convention,
    listeners: Vec<Box<dyn Listener>>,
) -> ! {
    let opts = HarnessOpts::parse();
    let code =
        opts.exec_with_listeners(&assembly, convention, listeners, &CiEnvironment::from_env());
    std::process::exit(code)
}

/// Runs a conventest test assembly.
#[derive(Debug, Parser)]
#[command(name = "conventest", version, max_term_width = 100)]
pub struct HarnessOpts {
    /// Report results as TeamCity service messages.
    #[arg(long, global = true)]
    teamcity: bool,

    /// Write a JUnit XML report to this path.
    #[arg(long, global = true, value_name = "PATH")]
    report: Option<Utf8PathBuf>,

    /// Config file [default: .config/conventest.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Produce color output.
    #[arg(long, global = true, value_enum, default_value_t, value_name = "WHEN")]
    color: Color,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every case in the assembly (the default).
    Run,

    /// List every case in the assembly, without running anything.
    Discover,

    /// Run only the named cases.
    RunMethods {
        /// Full names of the cases to run, in the form `Class.Method`.
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },
}

impl HarnessOpts {
    /// Executes the harness against `assembly`, returning the process exit code.
    ///
    /// Errors are logged to stderr before the corresponding exit code is returned.
    pub fn exec(
        self,
        assembly: &TestAssembly,
        convention: Convention,
        env: &CiEnvironment,
    ) -> i32 {
        self.exec_with_listeners(assembly, convention, Vec::new(), env)
    }

    /// Like [`exec`](Self::exec), but reports to `listeners` instead of the default listeners.
    ///
    /// The default listeners (the primary listener chosen from the configuration and
    /// environment, plus any AppVeyor or JUnit reporting) are only used if `listeners` is empty.
    pub fn exec_with_listeners<'l>(
        self,
        assembly: &TestAssembly,
        convention: Convention,
        listeners: Vec<Box<dyn Listener + 'l>>,
        env: &CiEnvironment,
    ) -> i32 {
        self.color.init();

        match self.exec_impl(assembly, convention, listeners, env) {
            Ok(code) => code,
            Err(error) => {
                error!("{}", DisplayErrorChain::new(&error));
                match error {
                    HarnessError::WriteEvent(_) => ConventestExitCode::WRITE_OUTPUT_ERROR,
                    _ => ConventestExitCode::SETUP_ERROR,
                }
            }
        }
    }

    fn exec_impl<'l>(
        self,
        assembly: &TestAssembly,
        mut convention: Convention,
        listeners: Vec<Box<dyn Listener + 'l>>,
        env: &CiEnvironment,
    ) -> Result<i32, HarnessError> {
        let mut config =
            RunnerConfig::from_sources(Utf8Path::new(""), self.config_file.as_deref())?;
        if self.teamcity {
            config.teamcity = Some(true);
        }
        if let Some(report) = self.report {
            config.report = Some(report);
        }

        // Parse names before anything is reported, so that bad input is a setup error.
        let methods = match &self.command {
            Some(Command::RunMethods { names }) => Some(
                names
                    .iter()
                    .map(|name| name.parse::<MethodGroup>())
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };

        config.apply_order(&mut convention);
        let runner = TestRunner::new(convention.build());
        let mut bus = Bus::new();
        if listeners.is_empty() {
            let selection = ListenerSelection::resolve(&config, env);
            subscribe_listeners(&mut bus, &selection, self.color)?;
        } else {
            debug!(count = listeners.len(), "reporting to custom listeners only");
            for listener in listeners {
                bus.subscribe_boxed(listener);
            }
        }

        let summary = match (self.command, methods) {
            (Some(Command::Discover), _) => {
                runner.discover(assembly, &mut bus)?;
                return Ok(ConventestExitCode::OK);
            }
            (_, Some(methods)) => {
                let summary = runner.run_methods(assembly, &methods, &mut bus)?;
                if summary.total() == 0 {
                    return Ok(ConventestExitCode::NO_TESTS_RUN);
                }
                summary
            }
            (_, None) => runner.run_assembly(assembly, &mut bus)?,
        };

        Ok(exit_code_for(&summary))
    }
}

fn subscribe_listeners(
    bus: &mut Bus<'_>,
    selection: &ListenerSelection,
    color: Color,
) -> Result<(), HarnessError> {
    match &selection.primary {
        PrimaryListener::TestExplorer(path) => {
            let file = File::create(path).map_err(|error| HarnessError::CreateOutput {
                file: path.clone(),
                error,
            })?;
            bus.subscribe(TestExplorerListener::new(BufWriter::new(file)));
        }
        PrimaryListener::TeamCity => {
            bus.subscribe(TeamCityListener::new(std::io::stdout()));
        }
        PrimaryListener::Console => {
            let mut listener = ConsoleListener::new(std::io::stdout());
            if color.should_colorize(supports_color::Stream::Stdout) {
                listener.colorize();
            }
            bus.subscribe(listener);
        }
    }
    if let Some(api_url) = &selection.appveyor {
        bus.subscribe(AppVeyorListener::new(api_url));
    }
    if let Some(path) = &selection.junit {
        bus.subscribe(JunitListener::new(path.clone()));
    }
    Ok(())
}

fn exit_code_for(summary: &ExecutionSummary) -> i32 {
    if summary.is_success() {
        ConventestExitCode::OK
    } else {
        ConventestExitCode::TEST_RUN_FAILED
    }
}
