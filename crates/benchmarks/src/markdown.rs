// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown output generation for run results.

use crate::result::PerformanceResult;
use benchwatch_core::{DataYield, RunSummary};
use std::fmt::{self, Write};

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

/// Render the record table into `output`.
pub fn render_summary(output: &mut impl Write, results: &[PerformanceResult]) -> fmt::Result {
    writeln!(output, "# Benchmark Summary")?;
    writeln!(output)?;
    writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(output)?;

    if let Some(first) = results.first() {
        writeln!(
            output,
            "Project `{}` on `{}`, revision `{}` ({})",
            first.project, first.environment, first.commit_id, first.branch
        )?;
        writeln!(output)?;
    }

    writeln!(output, "## Results")?;
    writeln!(output)?;
    writeln!(output, "| Benchmark | Value | Units | Min | Q1 | Q3 | Max |")?;
    writeln!(output, "|-----------|-------|-------|-----|----|----|-----|")?;

    for result in results {
        writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            result.benchmark,
            result.result_value,
            result.units.as_deref().unwrap_or("s"),
            optional(result.min),
            optional(result.q1),
            optional(result.q3),
            optional(result.max),
        )?;
    }

    writeln!(output)?;
    writeln!(output, "---")?;
    writeln!(output, "Total records: {}", results.len())
}

/// Render the per-step table into `output`.
pub fn render_step_report(output: &mut impl Write, summary: &RunSummary) -> fmt::Result {
    writeln!(output, "## Steps")?;
    writeln!(output)?;
    writeln!(output, "| Step | Status | Data | Duration (ms) |")?;
    writeln!(output, "|------|--------|------|---------------|")?;

    for step in &summary.steps {
        let data = match step.data {
            DataYield::NotApplicable => "-".to_string(),
            DataYield::Recorded(n) => format!("{n} record(s)"),
            DataYield::NoData => "no data".to_string(),
            DataYield::Excluded => "excluded".to_string(),
        };
        writeln!(
            output,
            "| {} | {} | {} | {} |",
            step.name,
            step.status,
            data,
            step.duration_ms.map(|d| d.to_string()).unwrap_or_default()
        )?;
    }

    writeln!(output)?;
    if let Some(halted_by) = &summary.halted_by {
        writeln!(output, "Halted by `{halted_by}`.")?;
    }
    writeln!(output, "Overall: {}", summary.overall())
}

/// Generate a markdown summary of the run's records.
pub fn generate_summary(results: &[PerformanceResult]) -> Result<String, fmt::Error> {
    let mut output = String::new();
    render_summary(&mut output, results)?;
    Ok(output)
}

/// Generate a markdown table of step verdicts.
pub fn generate_step_report(summary: &RunSummary) -> Result<String, fmt::Error> {
    let mut output = String::new();
    render_step_report(&mut output, summary)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ResultValue, MEMORY_UNITS, MEMORY_UNITS_TITLE};
    use crate::run::RunIdentity;
    use benchwatch_core::{StepReport, StepStatus};

    fn identity() -> RunIdentity {
        RunIdentity {
            project: "Zcash".to_string(),
            executable: "zcash".to_string(),
            environment: "perf-worker-1".to_string(),
            commit_id: "abc123".to_string(),
            branch: "master".to_string(),
            published_branch: None,
        }
    }

    #[test]
    fn test_summary_lists_every_record() {
        let id = identity();
        let results = vec![
            id.record("time verifyjoinsplit", ResultValue::Float(0.25))
                .with_range(0.2, 0.3),
            id.record("memory verifyjoinsplit", ResultValue::Integer(4096))
                .with_units(MEMORY_UNITS, Some(MEMORY_UNITS_TITLE)),
        ];
        let summary = generate_summary(&results).unwrap();
        assert!(summary.contains("| time verifyjoinsplit | 0.25 | s | 0.2 | - | - | 0.3 |"));
        assert!(summary.contains("| memory verifyjoinsplit | 4096 | Bytes |"));
        assert!(summary.contains("Total records: 2"));
        assert!(summary.contains("revision `abc123`"));
    }

    #[test]
    fn test_empty_summary() {
        let summary = generate_summary(&[]).unwrap();
        assert!(summary.contains("Total records: 0"));
        assert!(!summary.contains("revision"));
    }

    #[test]
    fn test_step_report_marks_halt() {
        let mut steps = RunSummary::default();
        let mut sleep = StepReport::start("time sleep");
        sleep.finish(StepStatus::Success);
        sleep.data = DataYield::Excluded;
        steps.push(sleep);
        let mut build = StepReport::start("build");
        build.finish(StepStatus::Failure);
        steps.push(build);
        steps.halted_by = Some("build".to_string());

        let report = generate_step_report(&steps).unwrap();
        assert!(report.contains("| time sleep | success | excluded |"));
        assert!(report.contains("| build | failure | - |"));
        assert!(report.contains("Halted by `build`."));
        assert!(report.contains("Overall: failure"));
    }

    /// Sink that rejects every write.
    struct Closed;

    impl Write for Closed {
        fn write_str(&mut self, _: &str) -> fmt::Result {
            Err(fmt::Error)
        }
    }

    #[test]
    fn test_writer_errors_propagate() {
        let results = vec![identity().record("time sleep", ResultValue::Float(1.0))];
        assert!(render_summary(&mut Closed, &results).is_err());
        assert!(render_step_report(&mut Closed, &RunSummary::default()).is_err());
    }
}
