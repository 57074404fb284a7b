// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Initial block download timing.
//!
//! Starts a node on a fresh data directory and tails its `debug.log`. The
//! interval observer measures the time from the version banner to the end of
//! initial block download and then cancels a token owned by this step, which
//! makes the process runner stop the node. A node stopped that way counts as
//! a successful run.

use super::{process_message, Step, StepContext, StepOutcome};
use crate::process::{run_streaming, CommandSpec, LineSource};
use crate::Result;
use async_trait::async_trait;
use benchwatch_benchmarks::ResultValue;
use benchwatch_core::observer::{
    LineObserver, TimestampIntervalObserver, DEFAULT_END_TAG, DEFAULT_START_TAG,
};
use benchwatch_core::{DataYield, StepStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Benchmark name of the published record.
pub const IBD_BENCHMARK: &str = "initialblockdownload-time";

/// Node binary used unless a step is given another.
pub const DEFAULT_NODE: &str = "./src/zcashd";

/// The node flushes its databases on shutdown; give it time.
pub const IBD_SIGTERM_GRACE: Duration = Duration::from_secs(30);

/// Log file name inside the data directory.
pub const DEBUG_LOG: &str = "debug.log";

/// Times initial block download of a node.
#[derive(Debug, Clone)]
pub struct InitialBlockDownloadStep {
    name: String,
    halt_on_failure: bool,
    datadir: PathBuf,
    node: CommandSpec,
    start_tag: String,
    end_tag: String,
}

impl InitialBlockDownloadStep {
    /// Step using `datadir` as the node's data directory.
    pub fn new(datadir: impl Into<PathBuf>) -> Self {
        Self {
            name: "time-InitialBlockDownload".to_string(),
            halt_on_failure: false,
            datadir: datadir.into(),
            node: CommandSpec::new(DEFAULT_NODE).sigterm_grace(IBD_SIGTERM_GRACE),
            start_tag: DEFAULT_START_TAG.to_string(),
            end_tag: DEFAULT_END_TAG.to_string(),
        }
    }

    /// Stop the pipeline when this step fails.
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Override the step name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use another node command; `-datadir=<dir>` is appended to it.
    pub fn with_node(mut self, node: CommandSpec) -> Self {
        self.node = node;
        self
    }

    /// Tags of the start and end log lines.
    pub fn with_tags(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.start_tag = start.into();
        self.end_tag = end.into();
        self
    }

    /// Full command, including the log file watch.
    pub fn command(&self) -> CommandSpec {
        self.node
            .clone()
            .arg(format!("-datadir={}", self.datadir.display()))
            .watch_logfile(self.datadir.join(DEBUG_LOG))
    }
}

#[async_trait]
impl Step for InitialBlockDownloadStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        // Child of the run token: an interrupted run also stops the node.
        let stop = ctx.cancel.child_token();
        let mut observer =
            TimestampIntervalObserver::with_tags(&self.start_tag, &self.end_tag, stop.clone())?;
        let mut elapsed = None;
        let name = self.name.as_str();

        let command = self.command();
        let outcome = run_streaming(&command, &stop, |source, line| match source {
            LineSource::LogFile => {
                if let Some(seconds) = observer.consume(line) {
                    elapsed = Some(seconds);
                }
            }
            _ => debug!(step = name, "{line}"),
        })
        .await?;

        let data = match elapsed {
            Some(seconds) => {
                let record = ctx
                    .run
                    .identity()
                    .record(IBD_BENCHMARK, ResultValue::Float(seconds));
                info!(step = name, seconds, "initial block download timed");
                ctx.run.append(record);
                DataYield::Recorded(1)
            }
            None => {
                warn!(step = name, "node exited before leaving initial block download");
                DataYield::NoData
            }
        };

        let status = if ctx.cancel.is_cancelled() {
            StepStatus::Cancelled
        } else if observer.requested_stop() || outcome.success() {
            StepStatus::Success
        } else {
            StepStatus::Failure
        };

        let mut result = StepOutcome::new(status).with_data(data);
        if status.is_failure() {
            if let Some(message) = process_message(&outcome) {
                result = result.with_message(message);
            }
        }
        Ok(result)
    }
}
