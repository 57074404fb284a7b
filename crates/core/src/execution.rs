// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Step verdicts and per-step reports for one pipeline run.
//!
//! A pipeline run is a flat, ordered list of steps. Each step ends with a
//! [`StepStatus`] and leaves behind a [`StepReport`]; the reports of a whole
//! run are collected into a [`RunSummary`].
//!
//! # Invariants
//!
//! ```text
//! RunSummary
//!   └─ StepReport (one per executed step, in execution order)
//! ```
//!
//! A step that produced no benchmark data is not a failed step: the two are
//! told apart by [`DataYield`], never by the status alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final verdict of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    /// Step completed successfully.
    #[default]
    Success,
    /// Step completed but flagged something worth a look.
    Warnings,
    /// Step ran and failed (non-zero exit, unexpected passes, ...).
    Failure,
    /// Step was not run.
    Skipped,
    /// Step could not run to completion because of an internal error.
    Exception,
    /// Step was interrupted before it finished.
    Cancelled,
}

impl StepStatus {
    /// Whether this verdict counts against the run.
    pub fn is_failure(self) -> bool {
        matches!(self, StepStatus::Failure | StepStatus::Exception)
    }

    /// Severity rank used to combine verdicts.
    fn rank(self) -> u8 {
        match self {
            StepStatus::Skipped => 0,
            StepStatus::Success => 1,
            StepStatus::Warnings => 2,
            StepStatus::Cancelled => 3,
            StepStatus::Failure => 4,
            StepStatus::Exception => 5,
        }
    }

    /// The more severe of two verdicts.
    pub fn worst(self, other: StepStatus) -> StepStatus {
        if other.rank() > self.rank() {
            other
        } else {
            self
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Success => "success",
            StepStatus::Warnings => "warnings",
            StepStatus::Failure => "failure",
            StepStatus::Skipped => "skipped",
            StepStatus::Exception => "exception",
            StepStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// What a step contributed to the published results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum DataYield {
    /// The step does not measure anything.
    #[default]
    NotApplicable,
    /// The step appended this many records to the run.
    Recorded(usize),
    /// The step measured nothing (its observer never completed or the
    /// output was malformed).
    NoData,
    /// The step measured a value that is deliberately not published, e.g.
    /// the `sleep` calibration benchmark.
    Excluded,
}

/// Report for one executed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    /// Step name as shown in the run summary.
    pub name: String,
    /// Final verdict.
    pub status: StepStatus,
    /// Benchmark data produced by the step.
    pub data: DataYield,
    /// Start time.
    pub start_time: DateTime<Utc>,
    /// End time (set when the step finishes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Number of steps this step spliced into the pipeline.
    #[serde(default)]
    pub injected_steps: usize,
    /// Error message for failed or excepted steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StepReport {
    /// Open a report for a step that starts now.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Success,
            data: DataYield::NotApplicable,
            start_time: Utc::now(),
            end_time: None,
            duration_ms: None,
            injected_steps: 0,
            error_message: None,
        }
    }

    /// Close the report with the given verdict.
    pub fn finish(&mut self, status: StepStatus) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.duration_ms = Some(
            now.signed_duration_since(self.start_time)
                .num_milliseconds()
                .unsigned_abs(),
        );
        self.status = status;
    }

    /// Close the report as [`StepStatus::Exception`] with an error message.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish(StepStatus::Exception);
        self.error_message = Some(error.into());
    }

    /// Report for a step that was never started.
    pub fn skipped(name: impl Into<String>) -> Self {
        let mut report = Self::start(name);
        report.finish(StepStatus::Skipped);
        report
    }
}

/// All step reports of one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Reports in execution order.
    pub steps: Vec<StepReport>,
    /// Name of the step that halted the run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted_by: Option<String>,
}

impl RunSummary {
    /// Append a step report.
    pub fn push(&mut self, report: StepReport) {
        self.steps.push(report);
    }

    /// Worst verdict across all steps; `Success` for an empty run.
    pub fn overall(&self) -> StepStatus {
        self.steps
            .iter()
            .fold(StepStatus::Success, |acc, r| acc.worst(r.status))
    }

    /// Whether the run finished without failed steps and without halting.
    pub fn is_success(&self) -> bool {
        self.halted_by.is_none() && !self.overall().is_failure()
    }

    /// Number of steps that ended with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|r| r.status == status).count()
    }

    /// Total records appended across all steps.
    pub fn records(&self) -> usize {
        self.steps
            .iter()
            .map(|r| match r.data {
                DataYield::Recorded(n) => n,
                _ => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_success() {
        let report = StepReport::start("git clean");
        assert_eq!(report.status, StepStatus::Success);
        assert!(report.end_time.is_none());
    }

    #[test]
    fn test_report_finish() {
        let mut report = StepReport::start("time sleep");
        report.finish(StepStatus::Failure);
        assert_eq!(report.status, StepStatus::Failure);
        assert!(report.end_time.is_some());
        assert!(report.duration_ms.is_some());
    }

    #[test]
    fn test_report_fail() {
        let mut report = StepReport::start("time createjoinsplit");
        report.fail("mean requires at least one data point");
        assert_eq!(report.status, StepStatus::Exception);
        assert_eq!(
            report.error_message.as_deref(),
            Some("mean requires at least one data point")
        );
    }

    #[test]
    fn test_worst() {
        assert_eq!(StepStatus::Success.worst(StepStatus::Failure), StepStatus::Failure);
        assert_eq!(StepStatus::Exception.worst(StepStatus::Failure), StepStatus::Exception);
        assert_eq!(StepStatus::Skipped.worst(StepStatus::Success), StepStatus::Success);
    }

    #[test]
    fn test_summary_overall_and_records() {
        let mut summary = RunSummary::default();
        let mut a = StepReport::start("time sleep");
        a.data = DataYield::Excluded;
        a.finish(StepStatus::Success);
        let mut b = StepReport::start("time parameterloading");
        b.data = DataYield::Recorded(1);
        b.finish(StepStatus::Success);
        let mut c = StepReport::start("memory verifyequihash");
        c.data = DataYield::NoData;
        c.finish(StepStatus::Failure);
        summary.push(a);
        summary.push(b);
        summary.push(c);

        assert_eq!(summary.overall(), StepStatus::Failure);
        assert!(!summary.is_success());
        assert_eq!(summary.records(), 1);
        assert_eq!(summary.count(StepStatus::Success), 2);
    }

    #[test]
    fn test_empty_summary_is_success() {
        assert!(RunSummary::default().is_success());
    }

    #[test]
    fn test_halted_summary_is_not_success() {
        let summary = RunSummary {
            steps: vec![],
            halted_by: Some("build.sh".to_string()),
        };
        assert!(!summary.is_success());
    }

    #[test]
    fn test_report_serialization() {
        let mut report = StepReport::start("memory sleep");
        report.data = DataYield::Excluded;
        report.finish(StepStatus::Success);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["data"]["kind"], "excluded");
    }
}
