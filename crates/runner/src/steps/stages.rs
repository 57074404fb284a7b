// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stage discovery and pipeline expansion.
//!
//! The test driver knows which stages the suite has. The expander asks it
//! with `--list-stages` and, if that works, hands back one step per stage to
//! be spliced into the pipeline right after itself. Stage steps never halt
//! the pipeline, so every stage runs and reports on its own.

use super::{process_message, process_status, ShellStep, Step, StepContext, StepOutcome};
use crate::process::{run_captured, CommandSpec};
use crate::Result;
use async_trait::async_trait;
use benchwatch_core::StepStatus;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Test driver used unless the expander is given another.
pub const DEFAULT_TEST_DRIVER: &str = "./qa/zcash/full_test_suite.py";

/// Stage names from the driver's listing: one per line, trimmed, blank
/// lines skipped.
pub fn extract_stages(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|stage| !stage.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lists the driver's stages and expands into one step per stage.
#[derive(Debug, Clone)]
pub struct StageExpander {
    name: String,
    driver: CommandSpec,
    stage_env: BTreeMap<String, String>,
}

impl Default for StageExpander {
    fn default() -> Self {
        Self::new(CommandSpec::new(DEFAULT_TEST_DRIVER))
    }
}

impl StageExpander {
    /// Expander for `driver`; stages run as `<driver> <stage>`.
    pub fn new(driver: CommandSpec) -> Self {
        Self {
            name: "list-stages".to_string(),
            driver,
            stage_env: BTreeMap::new(),
        }
    }

    /// Environment for the generated stage steps.
    pub fn with_stage_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.stage_env.insert(key.into(), value.into());
        self
    }

    /// Command listing the stages.
    pub fn list_command(&self) -> CommandSpec {
        self.driver.clone().arg("--list-stages")
    }

    /// Step running one stage.
    pub fn stage_step(&self, stage: &str) -> ShellStep {
        let command = self.driver.clone().arg(stage).envs(self.stage_env.clone());
        ShellStep::new(stage, command).halt_on_failure(false)
    }
}

#[async_trait]
impl Step for StageExpander {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let (outcome, stdout) = run_captured(&self.list_command(), &ctx.cancel).await?;
        let status = process_status(&outcome, &ctx.cancel);

        if status != StepStatus::Success {
            warn!(step = %self.name, ?outcome, "stage discovery failed, nothing injected");
            let mut result = StepOutcome::new(status);
            if let Some(message) = process_message(&outcome) {
                result = result.with_message(message);
            }
            return Ok(result);
        }

        let stages = extract_stages(&stdout);
        info!(step = %self.name, stages = ?stages, "stages discovered");
        let injected = stages
            .iter()
            .map(|stage| Box::new(self.stage_step(stage)) as Box<dyn Step>)
            .collect();
        Ok(StepOutcome::new(StepStatus::Success).with_injected(injected))
    }
}
