// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline steps.
//!
//! Every step implements [`Step`]. A step drives at most one process, feeds
//! its output to an observer, appends records to the run and returns a
//! [`StepOutcome`]. Steps may hand back new steps to be spliced into the
//! pipeline right after themselves.

use crate::process::ProcessOutcome;
use async_trait::async_trait;
use benchwatch_benchmarks::RunContext;
use benchwatch_core::{DataYield, StepStatus};
use std::fmt;
use tokio_util::sync::CancellationToken;

pub mod cargo_bench;
pub mod directory;
pub mod expected_failures;
pub mod initial_block_download;
pub mod performance;
pub mod shell;
pub mod stages;

pub use cargo_bench::CargoBenchStep;
pub use directory::DirectoryStep;
pub use expected_failures::ExpectedFailuresStep;
pub use initial_block_download::InitialBlockDownloadStep;
pub use performance::{Metric, PerformanceStep};
pub use shell::ShellStep;
pub use stages::{extract_stages, StageExpander};

/// What a step gets to work with.
pub struct StepContext<'a> {
    /// Records of the current run.
    pub run: &'a mut RunContext,
    /// Cancelled when the whole run is interrupted.
    pub cancel: CancellationToken,
}

/// Result of one step.
pub struct StepOutcome {
    /// Verdict.
    pub status: StepStatus,
    /// What the step contributed to the run's records.
    pub data: DataYield,
    /// Steps to run immediately after this one, in order.
    pub injected: Vec<Box<dyn Step>>,
    /// Reason shown for failed steps.
    pub message: Option<String>,
}

impl StepOutcome {
    /// Outcome with the given verdict and nothing else.
    pub fn new(status: StepStatus) -> Self {
        Self {
            status,
            data: DataYield::NotApplicable,
            injected: Vec::new(),
            message: None,
        }
    }

    /// Attach the data yield.
    pub fn with_data(mut self, data: DataYield) -> Self {
        self.data = data;
        self
    }

    /// Attach a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach steps to splice after the current one.
    pub fn with_injected(mut self, steps: Vec<Box<dyn Step>>) -> Self {
        self.injected = steps;
        self
    }
}

impl fmt::Debug for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepOutcome")
            .field("status", &self.status)
            .field("data", &self.data)
            .field(
                "injected",
                &self.injected.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("message", &self.message)
            .finish()
    }
}

/// One unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name shown in reports; also the benchmark name for measuring steps.
    fn name(&self) -> &str;

    /// Whether a failure of this step stops the rest of the pipeline.
    fn halt_on_failure(&self) -> bool {
        false
    }

    /// Whether this step runs even after the pipeline halted.
    fn always_run(&self) -> bool {
        false
    }

    /// Run the step.
    async fn run(&self, ctx: &mut StepContext<'_>) -> crate::Result<StepOutcome>;
}

/// Verdict for a plain command run.
pub(crate) fn process_status(outcome: &ProcessOutcome, cancel: &CancellationToken) -> StepStatus {
    if cancel.is_cancelled() {
        StepStatus::Cancelled
    } else if outcome.success() {
        StepStatus::Success
    } else {
        StepStatus::Failure
    }
}

/// Failure message for a plain command run, if it failed.
pub(crate) fn process_message(outcome: &ProcessOutcome) -> Option<String> {
    if outcome.timed_out {
        Some("command timed out".to_string())
    } else {
        match outcome.exit_code {
            Some(0) => None,
            Some(code) => Some(format!("command exited with status {code}")),
            None => Some("command was killed by a signal".to_string()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use benchwatch_benchmarks::{RunContext, RunIdentity};

    pub fn identity() -> RunIdentity {
        RunIdentity {
            project: "Zcash".to_string(),
            executable: "zcash".to_string(),
            environment: "test-worker".to_string(),
            commit_id: "0123abcd".to_string(),
            branch: "feature/x".to_string(),
            published_branch: Some("master".to_string()),
        }
    }

    pub fn run_context() -> RunContext {
        RunContext::new(identity())
    }
}
