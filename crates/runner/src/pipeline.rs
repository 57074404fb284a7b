// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sequential step queue.
//!
//! Steps run one at a time from the front of the queue. Steps injected by a
//! step are spliced in right after it, ahead of everything that was already
//! queued. Once a halting step fails (or the run is interrupted) the
//! remaining steps are skipped, except those marked to always run.

use crate::steps::{Step, StepContext};
use benchwatch_benchmarks::RunContext;
use benchwatch_core::{RunSummary, StepReport};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Ordered queue of steps.
#[derive(Default)]
pub struct Pipeline {
    name: String,
    queue: VecDeque<Box<dyn Step>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("steps", &self.step_names())
            .finish()
    }
}

impl Pipeline {
    /// Empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queue: VecDeque::new(),
        }
    }

    /// Append a step.
    pub fn with_step(mut self, step: impl Step + 'static) -> Self {
        self.push(Box::new(step));
        self
    }

    /// Append a boxed step.
    pub fn push(&mut self, step: Box<dyn Step>) {
        self.queue.push_back(step);
    }

    /// Put a step in front of all queued steps.
    pub fn push_front(&mut self, step: Box<dyn Step>) {
        self.queue.push_front(step);
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the queued steps, in order.
    pub fn step_names(&self) -> Vec<&str> {
        self.queue.iter().map(|s| s.name()).collect()
    }

    /// Number of queued steps.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no steps are queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run every step against `run`.
    ///
    /// Step errors do not abort the pipeline: the step is reported as an
    /// exception and the pipeline carries on (or halts, if the step halts on
    /// failure).
    pub async fn run(mut self, run: &mut RunContext, cancel: &CancellationToken) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(pipeline = %self.name, steps = self.queue.len(), run_id = %run.run_id(), "pipeline started");

        while let Some(step) = self.queue.pop_front() {
            let stopped = summary.halted_by.is_some() || cancel.is_cancelled();
            if stopped && !step.always_run() {
                info!(step = step.name(), "skipped");
                summary.push(StepReport::skipped(step.name()));
                continue;
            }

            info!(step = step.name(), "step started");
            let mut report = StepReport::start(step.name());
            let mut ctx = StepContext {
                run: &mut *run,
                cancel: cancel.clone(),
            };

            match step.run(&mut ctx).await {
                Ok(outcome) => {
                    report.data = outcome.data;
                    report.injected_steps = outcome.injected.len();
                    for injected in outcome.injected.into_iter().rev() {
                        self.queue.push_front(injected);
                    }
                    report.finish(outcome.status);
                    report.error_message = outcome.message;
                }
                Err(e) => {
                    error!(step = step.name(), error = %e, "step raised an error");
                    report.fail(e.to_string());
                }
            }

            info!(
                step = step.name(),
                status = %report.status,
                duration_ms = report.duration_ms,
                injected = report.injected_steps,
                "step finished"
            );

            if report.status.is_failure() && step.halt_on_failure() && summary.halted_by.is_none() {
                warn!(step = step.name(), "halting pipeline");
                summary.halted_by = Some(step.name().to_string());
            }
            summary.push(report);
        }

        info!(
            pipeline = %self.name,
            overall = %summary.overall(),
            records = run.len(),
            "pipeline finished"
        );
        summary
    }
}
