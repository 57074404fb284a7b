// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Expected-failures gate.
//!
//! Runs a test binary whose tests are all supposed to fail. The step passes
//! only if the command succeeds and googletest reports zero passing tests.

use super::{Step, StepContext, StepOutcome};
use crate::process::{run_streaming, CommandSpec, LineSource};
use crate::Result;
use async_trait::async_trait;
use benchwatch_core::observer::{LineObserver, PassCountObserver};
use benchwatch_core::StepStatus;
use tracing::{debug, info, warn};

/// Gate passing only when every expected failure failed.
#[derive(Debug, Clone)]
pub struct ExpectedFailuresStep {
    name: String,
    halt_on_failure: bool,
    command: CommandSpec,
}

impl Default for ExpectedFailuresStep {
    fn default() -> Self {
        Self::new(
            CommandSpec::new("make").args(["-C", "src", "zcash-gtest-expected-failures"]),
        )
    }
}

impl ExpectedFailuresStep {
    /// Gate running `command`.
    pub fn new(command: CommandSpec) -> Self {
        Self {
            name: "expected failures".to_string(),
            halt_on_failure: false,
            command,
        }
    }

    /// Stop the pipeline when this step fails.
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// The gated command.
    pub fn command(&self) -> &CommandSpec {
        &self.command
    }
}

#[async_trait]
impl Step for ExpectedFailuresStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let mut observer = PassCountObserver::new();
        let name = self.name.as_str();

        let outcome = run_streaming(&self.command, &ctx.cancel, |source, line| {
            if source == LineSource::Stdout {
                observer.consume(line);
            } else {
                debug!(step = name, stream = "stderr", "{line}");
            }
        })
        .await?;

        if ctx.cancel.is_cancelled() {
            return Ok(StepOutcome::new(StepStatus::Cancelled));
        }

        let passed = observer.result().copied();
        let result = match (outcome.success(), passed) {
            (true, Some(0)) => {
                info!(step = name, "all expected failures failed");
                StepOutcome::new(StepStatus::Success)
            }
            (true, Some(n)) => StepOutcome::new(StepStatus::Failure)
                .with_message(format!("{n} expected failure(s) passed")),
            (true, None) => StepOutcome::new(StepStatus::Failure)
                .with_message("no googletest pass count in output"),
            (false, _) => StepOutcome::new(StepStatus::Failure).with_message(format!(
                "command failed with exit code {:?}",
                outcome.exit_code
            )),
        };
        if result.status.is_failure() {
            warn!(step = name, passed = ?passed, exit_code = ?outcome.exit_code, "expected failures gate failed");
        }
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::steps::testing::run_context;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_halting_is_opt_in() {
        let step = ExpectedFailuresStep::default();
        assert!(!Step::halt_on_failure(&step));
        assert!(Step::halt_on_failure(&step.halt_on_failure(true)));
    }

    async fn gate(script: &str) -> StepOutcome {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        ExpectedFailuresStep::new(CommandSpec::new("sh").arg("-c").arg(script))
            .run(&mut ctx)
            .await
            .unwrap()
    }

    #[test]
    fn test_default_command() {
        assert_eq!(
            ExpectedFailuresStep::default().command().to_string(),
            "make -C src zcash-gtest-expected-failures"
        );
    }

    #[tokio::test]
    async fn test_zero_passed_is_success() {
        let outcome = gate("echo '[==========] 3 tests ran.'; echo '[  PASSED  ] 0 tests.'").await;
        assert_eq!(outcome.status, StepStatus::Success);
    }

    #[tokio::test]
    async fn test_some_passed_is_failure() {
        let outcome = gate("echo '[  PASSED  ] 2 tests.'").await;
        assert_eq!(outcome.status, StepStatus::Failure);
        assert_eq!(outcome.message.as_deref(), Some("2 expected failure(s) passed"));
    }

    #[tokio::test]
    async fn test_missing_summary_is_failure() {
        let outcome = gate("echo 'make: Nothing to be done'").await;
        assert_eq!(outcome.status, StepStatus::Failure);
    }

    #[tokio::test]
    async fn test_failed_command_is_failure_even_with_zero_passed() {
        let outcome = gate("echo '[  PASSED  ] 0 tests.'; exit 2").await;
        assert_eq!(outcome.status, StepStatus::Failure);
    }
}
