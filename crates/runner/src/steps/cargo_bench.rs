// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `cargo bench` results.

use super::{process_message, process_status, Step, StepContext, StepOutcome};
use crate::process::{run_streaming, CommandSpec, LineSource};
use crate::Result;
use async_trait::async_trait;
use benchwatch_benchmarks::result::CARGO_BENCH_UNITS;
use benchwatch_benchmarks::{PerformanceResult, ResultValue, RunIdentity};
use benchwatch_core::observer::{BenchCase, CargoBenchObserver, LineObserver};
use benchwatch_core::DataYield;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Runs `cargo bench` and records one result per benchmark case.
///
/// Records are filed under the checked-out branch and carry this step's
/// project and executable rather than the run's.
#[derive(Debug, Clone)]
pub struct CargoBenchStep {
    name: String,
    halt_on_failure: bool,
    project: String,
    executable: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cargo: CommandSpec,
}

impl CargoBenchStep {
    /// Bench `project`, publishing under `executable`.
    pub fn new(project: impl Into<String>, executable: impl Into<String>) -> Self {
        Self {
            name: "cargo bench".to_string(),
            halt_on_failure: false,
            project: project.into(),
            executable: executable.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cargo: CommandSpec::new("cargo"),
        }
    }

    /// Stop the pipeline when this step fails.
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Extra `cargo bench` arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extra environment for cargo.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Use another cargo command; `bench` and the arguments are appended.
    pub fn with_cargo(mut self, cargo: CommandSpec) -> Self {
        self.cargo = cargo;
        self
    }

    /// Full command line.
    pub fn command(&self) -> CommandSpec {
        self.cargo
            .clone()
            .arg("bench")
            .args(self.args.iter().cloned())
            .envs(self.env.clone())
    }

    fn to_record(&self, identity: &RunIdentity, case: &BenchCase) -> PerformanceResult {
        let mut record = identity
            .record(&case.name, ResultValue::Integer(case.median))
            .with_range(case.min(), case.max())
            .with_units(CARGO_BENCH_UNITS, None);
        record.project = self.project.clone();
        record.executable = self.executable.clone();
        record.branch = identity.branch.clone();
        record
    }
}

#[async_trait]
impl Step for CargoBenchStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let mut observer = CargoBenchObserver::new();
        let mut cases = Vec::new();
        let name = self.name.as_str();

        let outcome = run_streaming(&self.command(), &ctx.cancel, |source, line| {
            if source != LineSource::Stdout {
                debug!(step = name, stream = "stderr", "{line}");
                return;
            }
            if let Some(case) = observer.consume(line) {
                debug!(step = name, case = %case.name, median = case.median, "bench case");
                cases.push(case);
            }
        })
        .await?;

        for case in &cases {
            let record = self.to_record(ctx.run.identity(), case);
            ctx.run.append(record);
        }
        let data = if cases.is_empty() {
            warn!(step = name, "no bench cases in output");
            DataYield::NoData
        } else {
            info!(step = name, cases = cases.len(), "bench cases recorded");
            DataYield::Recorded(cases.len())
        };

        let status = process_status(&outcome, &ctx.cancel);
        let mut result = StepOutcome::new(status).with_data(data);
        if let Some(message) = process_message(&outcome).filter(|_| status.is_failure()) {
            result = result.with_message(message);
        }
        Ok(result)
    }
}
