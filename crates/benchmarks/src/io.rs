// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! I/O operations for run outputs.
//!
//! A run writes its records and step reports under one output directory:
//!
//! - `raw/` - one JSON file per record
//! - `all_results.json` - the record array, as published
//! - `steps.json` - per-step reports
//! - `summary.md` - markdown summary

use crate::markdown;
use crate::result::PerformanceResult;
use benchwatch_core::RunSummary;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default output directory.
pub const DEFAULT_OUTPUT_DIR: &str = "benchwatch-output";

/// Raw results subdirectory.
pub const RAW_DIR: &str = "raw";

/// Combined results file name.
pub const RESULTS_FILE: &str = "all_results.json";

/// Step report file name.
pub const STEPS_FILE: &str = "steps.json";

/// Summary file name.
pub const SUMMARY_FILE: &str = "summary.md";

fn json_error(e: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn render_error(e: std::fmt::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

/// Ensure the output directory and its raw subdirectory exist.
pub fn ensure_output_dirs(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir.join(RAW_DIR))
}

/// Write records to a JSON file.
pub fn write_results_json(results: &[PerformanceResult], path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(results).map_err(json_error)?;
    fs::write(path, json)
}

/// File name used for a record in the raw directory.
///
/// The position keeps repeated benchmark names from overwriting each other.
pub fn raw_file_name(position: usize, result: &PerformanceResult) -> String {
    let slug: String = result
        .benchmark
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    format!("{position:03}-{slug}.json")
}

/// Write one record to the raw directory, returning the file path.
pub fn write_raw_result(
    dir: &Path,
    position: usize,
    result: &PerformanceResult,
) -> io::Result<PathBuf> {
    ensure_output_dirs(dir)?;
    let path = dir.join(RAW_DIR).join(raw_file_name(position, result));
    let json = serde_json::to_string_pretty(result).map_err(json_error)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Write the markdown summary.
pub fn write_summary(
    dir: &Path,
    results: &[PerformanceResult],
    steps: &RunSummary,
) -> io::Result<()> {
    ensure_output_dirs(dir)?;
    let mut summary = markdown::generate_summary(results).map_err(render_error)?;
    summary.push('\n');
    summary.push_str(&markdown::generate_step_report(steps).map_err(render_error)?);
    fs::write(dir.join(SUMMARY_FILE), summary)
}

/// Write all outputs of a run (raw JSON, combined JSON, step reports, summary).
pub fn write_all_outputs(
    dir: &Path,
    results: &[PerformanceResult],
    steps: &RunSummary,
) -> io::Result<()> {
    ensure_output_dirs(dir)?;

    for (position, result) in results.iter().enumerate() {
        write_raw_result(dir, position, result)?;
    }

    write_results_json(results, dir.join(RESULTS_FILE))?;

    let steps_json = serde_json::to_string_pretty(steps).map_err(json_error)?;
    fs::write(dir.join(STEPS_FILE), steps_json)?;

    write_summary(dir, results, steps)?;

    info!(dir = %dir.display(), records = results.len(), "run outputs written");
    Ok(())
}

/// Read records from a JSON file.
pub fn read_results_json(path: impl AsRef<Path>) -> io::Result<Vec<PerformanceResult>> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(json_error)
}
