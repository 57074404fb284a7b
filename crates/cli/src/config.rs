// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered configuration.
//!
//! Settings are resolved from, lowest priority first:
//!
//! 1. built-in defaults ([`Settings::default`])
//! 2. an optional TOML file
//! 3. `BENCHWATCH_*` environment variables, with `__` between nested keys
//!    (`BENCHWATCH_PUBLISH__PASSWORD` sets `publish.password`)
//! 4. command-line overrides

use benchwatch_benchmarks::RunIdentity;
use benchwatch_core::MedianConvention;
use benchwatch_runner::PublishSettings;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BENCHWATCH";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged settings are inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Identity stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Project name.
    pub project: String,
    /// Executable name.
    pub executable: String,
    /// Worker (environment) name.
    pub worker: String,
    /// Revision under test.
    pub revision: String,
    /// Checked-out branch.
    pub branch: String,
    /// Branch node results are filed under.
    pub publish_branch: Option<String>,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            project: "Zcash".to_string(),
            executable: "zcash".to_string(),
            worker: "local".to_string(),
            revision: "unknown".to_string(),
            branch: "master".to_string(),
            publish_branch: Some("master".to_string()),
        }
    }
}

impl IdentitySettings {
    /// Identity for a new run.
    pub fn to_run_identity(&self) -> RunIdentity {
        RunIdentity {
            project: self.project.clone(),
            executable: self.executable.clone(),
            environment: self.worker.clone(),
            commit_id: self.revision.clone(),
            branch: self.branch.clone(),
            published_branch: self.publish_branch.clone(),
        }
    }
}

/// Locations of the tools the pipelines call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Measurement script.
    pub measurement_script: String,
    /// Test suite driver.
    pub test_driver: String,
    /// Node binary.
    pub node: String,
    /// Scratch data directory for initial block download.
    pub ibd_datadir: PathBuf,
    /// Lock file guarding the proving parameter fetch.
    pub fetch_lock: PathBuf,
    /// Symbolizer handed to AddressSanitizer.
    pub llvm_symbolizer: String,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            measurement_script: "./qa/zcash/performance-measurements.sh".to_string(),
            test_driver: "./qa/zcash/full_test_suite.py".to_string(),
            node: "./src/zcashd".to_string(),
            ibd_datadir: PathBuf::from("ibd-datadir"),
            fetch_lock: std::env::temp_dir().join("benchwatch-fetch-params.lock"),
            llvm_symbolizer: "/usr/bin/llvm-symbolizer".to_string(),
        }
    }
}

/// Sample statistics options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// Median of even-sized samples.
    pub median_convention: MedianConvention,
}

/// `cargo bench` pipeline options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CargoBenchSettings {
    /// Project the bench results are filed under.
    pub project: String,
    /// Executable the bench results are filed under.
    pub executable: String,
    /// Extra `cargo bench` arguments.
    pub args: Vec<String>,
    /// Target triple of the nightly toolchain installed before cargo runs.
    pub nightly_target: String,
}

impl Default for CargoBenchSettings {
    fn default() -> Self {
        Self {
            project: "Pairing".to_string(),
            executable: "pairing".to_string(),
            args: vec!["--features".to_string(), "u128-support".to_string()],
            nightly_target: "x86_64-unknown-linux-gnu".to_string(),
        }
    }
}

/// All settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default log filter, used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Record identity.
    pub identity: IdentitySettings,
    /// Tool locations.
    pub paths: PathSettings,
    /// Dashboard publishing.
    pub publish: PublishSettings,
    /// Statistics options.
    pub stats: StatsSettings,
    /// `cargo bench` options.
    pub cargo_bench: CargoBenchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            identity: IdentitySettings::default(),
            paths: PathSettings::default(),
            publish: PublishSettings::default(),
            stats: StatsSettings::default(),
            cargo_bench: CargoBenchSettings::default(),
        }
    }
}

/// Inputs to [`Settings::load`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// TOML file to merge over the defaults.
    pub file: Option<PathBuf>,
    /// Key/value overrides applied last (`"publish.enabled"` -> `"true"`).
    pub overrides: Vec<(String, String)>,
    /// Environment to read instead of the process environment.
    pub env: Option<HashMap<String, String>>,
}

impl Settings {
    /// Resolve settings from all layers.
    pub fn load(options: &LoadOptions) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = &options.file {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(options.env.clone()),
        );

        for (key, value) in &options.overrides {
            builder = builder.set_override(key.as_str(), value.as_str())?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.publish.enabled {
            if self.publish.url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "publish.url is required when publishing".to_string(),
                ));
            }
            if self.publish.password.is_none() {
                return Err(ConfigError::Invalid(
                    "publish.password is required when publishing".to_string(),
                ));
            }
        }
        if self.identity.project.trim().is_empty() {
            return Err(ConfigError::Invalid("identity.project must not be empty".to_string()));
        }
        Ok(())
    }
}
