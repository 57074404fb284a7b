// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command-line interface for benchwatch.
//!
//! `benchwatch run --preset <name>` builds one of the built-in pipelines,
//! runs it against the source tree in the working directory, writes the
//! records and step reports to an output directory and optionally publishes
//! them to the dashboard.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod logging;
pub mod presets;

use anyhow::{Context, Result};
use benchwatch_benchmarks::{io, markdown, RunContext};
use benchwatch_core::{RunSummary, StepStatus};
use clap::{Parser, Subcommand};
use colored::Colorize;
use config::{LoadOptions, Settings};
use presets::Preset;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Benchwatch CLI.
#[derive(Parser, Debug)]
#[command(name = "benchwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, global = true, env = "BENCHWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a built-in pipeline.
    ///
    /// Results are written to:
    /// - <output>/raw/ - one JSON file per record
    /// - <output>/all_results.json - all records
    /// - <output>/steps.json - step reports
    /// - <output>/summary.md - markdown summary
    Run {
        /// Pipeline to run.
        #[arg(short, long, value_enum)]
        preset: Preset,

        /// Output directory.
        #[arg(short, long, default_value = io::DEFAULT_OUTPUT_DIR)]
        output: PathBuf,

        /// Publish records to the dashboard.
        #[arg(long)]
        publish: bool,

        /// Revision under test (overrides `identity.revision`).
        #[arg(long)]
        revision: Option<String>,

        /// Checked-out branch (overrides `identity.branch`).
        #[arg(long)]
        branch: Option<String>,
    },

    /// List the built-in pipelines.
    Presets {
        /// Also list each pipeline's steps.
        #[arg(short, long)]
        steps: bool,
    },

    /// Print a markdown summary of a previous run.
    Report {
        /// Output directory of the run.
        #[arg(default_value = io::DEFAULT_OUTPUT_DIR)]
        dir: PathBuf,
    },

    /// Show the effective configuration.
    Status {
        /// Show detailed status information.
        #[arg(short, long)]
        detailed: bool,
    },
}

impl Commands {
    fn overrides(&self) -> Vec<(String, String)> {
        let mut overrides = Vec::new();
        if let Commands::Run {
            publish,
            revision,
            branch,
            ..
        } = self
        {
            if *publish {
                overrides.push(("publish.enabled".to_string(), "true".to_string()));
            }
            if let Some(revision) = revision {
                overrides.push(("identity.revision".to_string(), revision.clone()));
            }
            if let Some(branch) = branch {
                overrides.push(("identity.branch".to_string(), branch.clone()));
            }
        }
        overrides
    }
}

/// Parse the command line and run it.
///
/// # Returns
///
/// The process exit code: failure when any step failed or the run halted.
pub fn run() -> Result<ExitCode> {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let settings = Settings::load(&LoadOptions {
        file: cli.config.clone(),
        overrides: cli.command.overrides(),
        env: None,
    })?;

    match cli.command {
        Commands::Run { preset, output, .. } => {
            logging::init(&settings.log_level, settings.log_format)?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(run_preset(preset, &settings, &output))
        }
        Commands::Presets { steps } => {
            for preset in Preset::ALL {
                println!("{:<24} {}", preset.as_str().bold(), preset.description());
                if steps {
                    for name in preset.pipeline(&settings).step_names() {
                        println!("    - {name}");
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Report { dir } => {
            let results = io::read_results_json(dir.join(io::RESULTS_FILE))
                .with_context(|| format!("cannot read results from {}", dir.display()))?;
            let summary =
                markdown::generate_summary(&results).context("cannot render summary")?;
            print!("{summary}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Status { detailed } => {
            print_status(&settings, cli.config.as_deref(), detailed)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_preset(preset: Preset, settings: &Settings, output: &Path) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping the current step");
            interrupt.cancel();
        }
    });

    let pipeline = preset.pipeline(settings);
    info!(preset = %preset, steps = pipeline.len(), "starting pipeline");

    let mut run = RunContext::new(settings.identity.to_run_identity());
    let summary = pipeline.run(&mut run, &cancel).await;

    io::write_all_outputs(output, run.results(), &summary)
        .with_context(|| format!("cannot write outputs to {}", output.display()))?;

    print_summary(&summary, run.len(), output);
    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn colored_status(status: StepStatus) -> colored::ColoredString {
    let text = status.to_string();
    let text = text.as_str();
    match status {
        StepStatus::Success => text.green(),
        StepStatus::Warnings | StepStatus::Skipped => text.yellow(),
        StepStatus::Failure | StepStatus::Exception => text.red(),
        StepStatus::Cancelled => text.magenta(),
    }
}

fn print_summary(summary: &RunSummary, records: usize, output: &Path) {
    for step in &summary.steps {
        print!("{:>10}  {}", colored_status(step.status), step.name);
        if let Some(message) = &step.error_message {
            print!(" ({})", message.dimmed());
        }
        println!();
    }
    if let Some(step) = &summary.halted_by {
        println!("{} halted by {}", "pipeline".red(), step.bold());
    }
    println!(
        "\n{} {} steps, {} records, overall {}",
        "Completed".bold(),
        summary.steps.len(),
        records,
        colored_status(summary.overall())
    );
    println!("Results written to {}", output.display());
}

fn print_status(settings: &Settings, file: Option<&Path>, detailed: bool) -> Result<()> {
    println!("Benchwatch");
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    match file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: none (defaults and environment)"),
    }
    println!(
        "Identity: {} / {} on {} @ {} ({})",
        settings.identity.project,
        settings.identity.executable,
        settings.identity.worker,
        settings.identity.revision,
        settings.identity.branch
    );
    println!(
        "Publishing: {}",
        if settings.publish.enabled {
            settings.publish.endpoint()
        } else {
            "disabled".to_string()
        }
    );

    if detailed {
        // The password is never serialized.
        let rendered = toml::to_string_pretty(settings).context("cannot render settings")?;
        println!("\n{rendered}");
    }
    Ok(())
}
