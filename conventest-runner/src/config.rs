// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runner configuration, and the selection of listeners for a run.
//!
//! Configuration is layered: the defaults embedded in conventest come first, followed by the
//! optional file at `.config/conventest.toml`. Command-line flags are applied on top by the
//! [`harness`](crate::harness).

use crate::{convention::Convention, errors::ConfigParseError};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;
use tracing::{info, warn};

/// The environment variable whose presence indicates a run under TeamCity.
pub const TEAMCITY_PROJECT_ENV: &str = "TEAMCITY_PROJECT_NAME";

/// The environment variable an IDE integration sets to receive the framed result stream.
pub const RESULT_STREAM_ENV: &str = "CONVENTEST_RESULT_STREAM";

/// The environment variable AppVeyor sets to `True` on its build workers.
pub const APPVEYOR_ENV: &str = "APPVEYOR";

/// The environment variable holding the base URL of the AppVeyor build worker API.
pub const APPVEYOR_API_URL_ENV: &str = "APPVEYOR_API_URL";

/// Overall configuration for a run.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// Whether to report results as TeamCity service messages. If unset, this is decided by
    /// [`CiEnvironment`].
    #[serde(default)]
    pub teamcity: Option<bool>,

    /// Where to write a JUnit XML report, if anywhere.
    #[serde(default)]
    pub report: Option<Utf8PathBuf>,

    /// Where to write the framed result stream, if anywhere.
    #[serde(default)]
    pub result_stream: Option<Utf8PathBuf>,

    /// The order in which each class's cases run.
    pub order: CaseOrderConfig,

    /// The seed for [`CaseOrderConfig::Shuffle`]. A random seed is chosen if unset.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl RunnerConfig {
    /// The default location of the config within the path being run from.
    pub const CONFIG_PATH: &'static str = ".config/conventest.toml";

    /// The built-in defaults, in TOML. The repository's config file is layered over these.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config for the given root directory.
    ///
    /// If `file` is `None`, the config at [`Self::CONFIG_PATH`] within `root` is used if it
    /// exists. If `file` is given, it must exist.
    pub fn from_sources(
        root: impl AsRef<Utf8Path>,
        file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = root.as_ref().join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        Self::make_default_config()
            .add_source(source)
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new(config_file, err))
    }

    /// Returns the default config, with no repository-specific settings.
    pub fn default_config() -> Result<Self, ConfigParseError> {
        Self::make_default_config()
            .build()
            .and_then(|config| config.try_deserialize())
            .map_err(|err| ConfigParseError::new("<default config>", err))
    }

    /// Applies the configured case order to `convention`.
    ///
    /// [`CaseOrderConfig::Declaration`] leaves the convention's own ordering in place.
    pub fn apply_order(&self, convention: &mut Convention) {
        match self.order {
            CaseOrderConfig::Declaration => {}
            CaseOrderConfig::Sorted => {
                convention
                    .class_execution
                    .sort_cases(|a, b| a.name().cmp(b.name()));
            }
            CaseOrderConfig::Shuffle => {
                let seed = self.seed.unwrap_or_else(rand::random);
                info!(seed, "shuffling cases");
                convention
                    .class_execution
                    .shuffle_cases(StdRng::seed_from_u64(seed));
            }
        }
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }
}

/// The order in which each class's cases run.
#[derive(Copy, Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum CaseOrderConfig {
    /// The order chosen by the convention.
    Declaration,

    /// Sorted by case name.
    Sorted,

    /// A random order.
    Shuffle,
}

/// Signals from the environment that a run is hosted by an external integration.
///
/// These are read once, at startup, so that listener selection is a pure function of its
/// inputs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CiEnvironment {
    /// The TeamCity project name, if running under TeamCity.
    pub teamcity_project: Option<String>,

    /// The path an IDE integration wants the framed result stream written to.
    pub result_stream: Option<Utf8PathBuf>,

    /// True if running on an AppVeyor build worker.
    pub appveyor: bool,

    /// The base URL of the AppVeyor build worker API.
    pub appveyor_api_url: Option<String>,
}

impl CiEnvironment {
    /// Reads the recognized signals from the process environment.
    pub fn from_env() -> Self {
        Self {
            teamcity_project: non_empty_var(TEAMCITY_PROJECT_ENV),
            result_stream: non_empty_var(RESULT_STREAM_ENV).map(Utf8PathBuf::from),
            appveyor: std::env::var(APPVEYOR_ENV).is_ok_and(|value| value == "True"),
            appveyor_api_url: non_empty_var(APPVEYOR_API_URL_ENV),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// The listener that receives case results on the main output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PrimaryListener {
    /// The framed result stream, written to the given path.
    TestExplorer(Utf8PathBuf),

    /// TeamCity service messages on stdout.
    TeamCity,

    /// Human-readable output on stdout.
    Console,
}

/// The listeners to attach to a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListenerSelection {
    /// The primary listener.
    pub primary: PrimaryListener,

    /// The AppVeyor build worker API to report case results to, alongside the primary
    /// listener.
    pub appveyor: Option<String>,

    /// Where to write a JUnit XML report, if anywhere.
    pub junit: Option<Utf8PathBuf>,
}

impl ListenerSelection {
    /// Resolves the listeners for a run.
    ///
    /// A result stream takes precedence over everything else, followed by TeamCity output, with
    /// console output as the fallback. Configured values take precedence over environment
    /// signals. On AppVeyor, results are also posted to the build worker API.
    pub fn resolve(config: &RunnerConfig, env: &CiEnvironment) -> Self {
        let result_stream = config
            .result_stream
            .clone()
            .or_else(|| env.result_stream.clone());
        let teamcity = config
            .teamcity
            .unwrap_or(env.teamcity_project.is_some());

        let primary = match result_stream {
            Some(path) => PrimaryListener::TestExplorer(path),
            None if teamcity => PrimaryListener::TeamCity,
            None => PrimaryListener::Console,
        };

        let appveyor = if env.appveyor {
            if env.appveyor_api_url.is_none() {
                warn!("running on AppVeyor, but {APPVEYOR_API_URL_ENV} is not set");
            }
            env.appveyor_api_url.clone()
        } else {
            None
        };

        Self {
            primary,
            appveyor,
            junit: config.report.clone(),
        }
    }
}
