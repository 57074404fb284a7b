// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Plain command step.

use super::{process_message, process_status, Step, StepContext, StepOutcome};
use crate::lock::FileLock;
use crate::process::{run_streaming, CommandSpec, LineSource};
use crate::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Runs one command; the verdict follows its exit status.
#[derive(Debug, Clone)]
pub struct ShellStep {
    name: String,
    command: CommandSpec,
    halt_on_failure: bool,
    always_run: bool,
    lock: Option<PathBuf>,
}

impl ShellStep {
    /// Step named `name` running `command`.
    pub fn new(name: impl Into<String>, command: CommandSpec) -> Self {
        Self {
            name: name.into(),
            command,
            halt_on_failure: false,
            always_run: false,
            lock: None,
        }
    }

    /// Stop the pipeline when this step fails.
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Run even after the pipeline halted.
    pub fn always_run(mut self, always: bool) -> Self {
        self.always_run = always;
        self
    }

    /// Hold the exclusive lock at `path` while the command runs.
    pub fn with_lock(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock = Some(path.into());
        self
    }

    /// The command this step runs.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }
}

#[async_trait]
impl Step for ShellStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    fn always_run(&self) -> bool {
        self.always_run
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let _guard = match &self.lock {
            Some(path) => Some(FileLock::acquire(path).await?),
            None => None,
        };

        let name = self.name.as_str();
        let outcome = run_streaming(&self.command, &ctx.cancel, |source, line| match source {
            LineSource::Stderr => debug!(step = name, stream = "stderr", "{line}"),
            _ => debug!(step = name, stream = "stdout", "{line}"),
        })
        .await?;

        let status = process_status(&outcome, &ctx.cancel);
        let mut result = StepOutcome::new(status);
        if status.is_failure() {
            warn!(step = name, ?outcome, "command failed");
            if let Some(message) = process_message(&outcome) {
                result = result.with_message(message);
            }
        } else {
            info!(step = name, %status, "command finished");
        }
        Ok(result)
    }
}
