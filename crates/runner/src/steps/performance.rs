// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Time, memory and valgrind measurements.
//!
//! A [`PerformanceStep`] runs the measurement script once for one benchmark
//! and metric and turns what its observer extracts into a record:
//!
//! | metric   | observer                  | record                                  |
//! |----------|---------------------------|-----------------------------------------|
//! | time     | [`BracketedJsonObserver`] | median, min, max, q1, q3 of the sample  |
//! | memory   | [`PeakMemoryObserver`]    | peak total bytes with units             |
//! | valgrind | none                      | nothing, the run is only checked        |
//!
//! The `sleep` benchmark only calibrates the harness; its value is measured
//! but never recorded.

use super::{process_message, process_status, Step, StepContext, StepOutcome};
use crate::process::{run_streaming, CommandSpec, LineSource};
use crate::Result;
use async_trait::async_trait;
use benchwatch_benchmarks::result::{MEMORY_UNITS, MEMORY_UNITS_TITLE};
use benchwatch_benchmarks::{PerformanceResult, ResultValue, RunIdentity};
use benchwatch_core::observer::{BracketedJsonObserver, LineObserver, PeakMemoryObserver};
use benchwatch_core::{DataYield, MedianConvention, TimingSummary};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Measurement script used unless a step is given another.
pub const DEFAULT_MEASUREMENT_SCRIPT: &str = "./qa/zcash/performance-measurements.sh";

/// Benchmark whose values are never recorded.
pub const CALIBRATION_BENCHMARK: &str = "sleep";

/// What a [`PerformanceStep`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Wall-clock timing sample.
    Time,
    /// Peak heap usage.
    Memory,
    /// Run under valgrind; nothing is extracted.
    Valgrind,
}

impl Metric {
    /// Name passed to the measurement script.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Time => "time",
            Metric::Memory => "memory",
            Metric::Valgrind => "valgrind",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

enum Measurement {
    Timing(Vec<f64>),
    Memory(u64),
}

enum MetricObserver {
    Timing(BracketedJsonObserver),
    Memory(PeakMemoryObserver),
    Unobserved,
}

impl MetricObserver {
    fn for_metric(metric: Metric) -> Self {
        match metric {
            Metric::Time => MetricObserver::Timing(BracketedJsonObserver::new()),
            Metric::Memory => MetricObserver::Memory(PeakMemoryObserver::new()),
            Metric::Valgrind => MetricObserver::Unobserved,
        }
    }

    fn consume(&mut self, line: &str) -> Option<Measurement> {
        match self {
            MetricObserver::Timing(o) => o.consume(line).map(Measurement::Timing),
            MetricObserver::Memory(o) => o.consume(line).map(Measurement::Memory),
            MetricObserver::Unobserved => None,
        }
    }
}

/// One benchmark measured with one metric.
#[derive(Debug, Clone)]
pub struct PerformanceStep {
    name: String,
    halt_on_failure: bool,
    metric: Metric,
    benchmark: String,
    args: Vec<String>,
    script: CommandSpec,
    median_convention: MedianConvention,
}

impl PerformanceStep {
    /// Measure `benchmark` with `metric`; named `"<metric> <benchmark>"`.
    pub fn new(metric: Metric, benchmark: impl Into<String>) -> Self {
        let benchmark = benchmark.into();
        Self {
            name: format!("{metric} {benchmark}"),
            halt_on_failure: false,
            metric,
            benchmark,
            args: Vec::new(),
            script: CommandSpec::new(DEFAULT_MEASUREMENT_SCRIPT),
            median_convention: MedianConvention::default(),
        }
    }

    /// Shorthand for a timing step.
    pub fn time(benchmark: impl Into<String>) -> Self {
        Self::new(Metric::Time, benchmark)
    }

    /// Shorthand for a memory step.
    pub fn memory(benchmark: impl Into<String>) -> Self {
        Self::new(Metric::Memory, benchmark)
    }

    /// Shorthand for a valgrind step.
    pub fn valgrind(benchmark: impl Into<String>) -> Self {
        Self::new(Metric::Valgrind, benchmark)
    }

    /// Extra benchmark arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Stop the pipeline when this step fails.
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Override the step name, which is also the published benchmark name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use another measurement script.
    pub fn with_script(mut self, script: CommandSpec) -> Self {
        self.script = script;
        self
    }

    /// Median convention for timing summaries.
    pub fn with_median_convention(mut self, convention: MedianConvention) -> Self {
        self.median_convention = convention;
        self
    }

    /// The measured metric.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Whether values from this step are kept out of the results.
    pub fn is_calibration(&self) -> bool {
        self.benchmark == CALIBRATION_BENCHMARK
    }

    /// Full command line.
    pub fn command(&self) -> CommandSpec {
        self.script
            .clone()
            .arg(self.metric.as_str())
            .arg(&self.benchmark)
            .args(self.args.iter().cloned())
    }

    fn to_record(
        &self,
        identity: &RunIdentity,
        measurement: Measurement,
    ) -> Result<PerformanceResult> {
        let record = match measurement {
            Measurement::Timing(sample) => {
                let summary = TimingSummary::from_sample(&sample, self.median_convention)?;
                identity
                    .record(&self.name, ResultValue::Float(summary.median))
                    .with_timing(&summary)
            }
            Measurement::Memory(bytes) => identity
                .record(&self.name, ResultValue::Integer(bytes))
                .with_units(MEMORY_UNITS, Some(MEMORY_UNITS_TITLE)),
        };
        Ok(record)
    }
}

#[async_trait]
impl Step for PerformanceStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn halt_on_failure(&self) -> bool {
        self.halt_on_failure
    }

    async fn run(&self, ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        let command = self.command();
        let mut observer = MetricObserver::for_metric(self.metric);
        let mut measurement = None;
        let name = self.name.as_str();

        let outcome = run_streaming(&command, &ctx.cancel, |source, line| {
            if source != LineSource::Stdout {
                debug!(step = name, stream = "stderr", "{line}");
                return;
            }
            if measurement.is_none() {
                if let Some(value) = observer.consume(line) {
                    debug!(step = name, "measurement extracted");
                    measurement = Some(value);
                }
            }
        })
        .await?;

        let data = match measurement {
            None if self.metric == Metric::Valgrind => DataYield::NotApplicable,
            None if self.is_calibration() => {
                info!(step = name, "no data from calibration benchmark");
                DataYield::NoData
            }
            None => {
                warn!(step = name, "no data extracted from output");
                DataYield::NoData
            }
            Some(measurement) => {
                let record = self.to_record(ctx.run.identity(), measurement)?;
                if self.is_calibration() {
                    info!(step = name, value = %record.result_value, "calibration value not recorded");
                    DataYield::Excluded
                } else {
                    info!(step = name, value = %record.result_value, "result recorded");
                    ctx.run.append(record);
                    DataYield::Recorded(1)
                }
            }
        };

        let status = process_status(&outcome, &ctx.cancel);
        let mut result = StepOutcome::new(status).with_data(data);
        if status.is_failure() {
            warn!(step = name, ?outcome, "measurement command failed");
            if let Some(message) = process_message(&outcome) {
                result = result.with_message(message);
            }
        }
        Ok(result)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::steps::testing::run_context;
    use crate::RunnerError;
    use benchwatch_core::StepStatus;
    use pretty_assertions::assert_eq;
    use tokio_util::sync::CancellationToken;

    /// Measurement script stand-in: `$1` is the metric, `$2` the benchmark.
    fn script(body: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(body).arg("performance-measurements.sh")
    }

    const TIMING_OUTPUT: &str = r#"
echo "Running benchmark $2 ($1)"
echo 'timings: [ {"runningtime": 2.5},'
echo '  {"runningtime": 1.5}, {"runningtime": 2.0} ] done'
"#;

    const MASSIF_OUTPUT: &str = r#"
echo "Detailed snapshots: [3, 7, 9 (peak), 12]"
echo "  n        time(i)         total(B)   useful-heap(B) extra-heap(B)    stacks(B)"
echo "  9     40,121,330       12,345,678       12,000,000       345,678            0"
"#;

    #[test]
    fn test_command_line() {
        let step = PerformanceStep::time("sendtoaddress")
            .with_args(["200k-recv", "0.0009"])
            .named("time-sendtoaddress-200k-recv-1");
        assert_eq!(
            step.command().to_string(),
            "./qa/zcash/performance-measurements.sh time sendtoaddress 200k-recv 0.0009"
        );
        assert_eq!(step.name(), "time-sendtoaddress-200k-recv-1");
        assert_eq!(PerformanceStep::memory("sleep").name(), "memory sleep");
    }

    #[tokio::test]
    async fn test_timing_record() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let step = PerformanceStep::time("verifyjoinsplit").with_script(script(TIMING_OUTPUT));
        let outcome = step.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.data, DataYield::Recorded(1));
        let record = &run.results()[0];
        assert_eq!(record.benchmark, "time verifyjoinsplit");
        assert_eq!(record.branch, "master");
        assert_eq!(record.result_value, ResultValue::Float(2.0));
        assert_eq!(record.min, Some(1.5));
        assert_eq!(record.max, Some(2.5));
        assert_eq!(record.units, None);
    }

    #[tokio::test]
    async fn test_memory_record() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let step = PerformanceStep::memory("solveequihash")
            .with_args(["2"])
            .named("memory solveequihash 2 threads")
            .with_script(script(MASSIF_OUTPUT));
        let outcome = step.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.data, DataYield::Recorded(1));
        let record = &run.results()[0];
        assert_eq!(record.benchmark, "memory solveequihash 2 threads");
        assert_eq!(record.result_value, ResultValue::Integer(12_345_678));
        assert_eq!(record.units.as_deref(), Some("Bytes"));
        assert_eq!(record.units_title.as_deref(), Some("Total memory"));
    }

    #[tokio::test]
    async fn test_sleep_is_measured_but_not_recorded() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let step = PerformanceStep::time("sleep").with_script(script(TIMING_OUTPUT));
        let outcome = step.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.data, DataYield::Excluded);
        assert!(run.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_output_is_no_data_not_failure() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let step = PerformanceStep::time("createjoinsplit")
            .with_script(script("echo '[ not valid json ]'"));
        let outcome = step.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.status, StepStatus::Success);
        assert_eq!(outcome.data, DataYield::NoData);
        assert!(run.is_empty());
    }

    #[tokio::test]
    async fn test_failed_script_keeps_extracted_value() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let body = format!("{MASSIF_OUTPUT}\nexit 1");
        let step = PerformanceStep::memory("verifyequihash").with_script(script(&body));
        let outcome = step.run(&mut ctx).await.unwrap();

        assert_eq!(outcome.status, StepStatus::Failure);
        assert_eq!(outcome.data, DataYield::Recorded(1));
        assert_eq!(run.len(), 1);
    }

    #[tokio::test]
    async fn test_valgrind_has_no_data() {
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };
        let step = PerformanceStep::valgrind("parameterloading")
            .with_script(script("echo '==123== ERROR SUMMARY: 0 errors from 0 contexts'"));
        let outcome = step.run(&mut ctx).await.unwrap();
        assert_eq!(outcome.data, DataYield::NotApplicable);
        assert_eq!(outcome.status, StepStatus::Success);
    }

    #[test]
    fn test_empty_sample_is_statistics_error() {
        let step = PerformanceStep::time("verifyequihash");
        let err = step
            .to_record(&crate::steps::testing::identity(), Measurement::Timing(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, RunnerError::Statistics(_)));
    }
}
