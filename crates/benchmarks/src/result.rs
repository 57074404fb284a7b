// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Performance result records.
//!
//! This module provides the flat record published to the benchmark
//! dashboard. Every record carries its full identity so that it can be
//! published on its own.

use benchwatch_core::TimingSummary;
use serde::{Deserialize, Serialize};

/// Units reported for memory benchmarks.
pub const MEMORY_UNITS: &str = "Bytes";

/// Units title reported for memory benchmarks.
pub const MEMORY_UNITS_TITLE: &str = "Total memory";

/// Units reported for `cargo bench` cases.
pub const CARGO_BENCH_UNITS: &str = "ns/iter";

/// Measured value of a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    /// Whole-number measurements (bytes, ns/iter).
    Integer(u64),
    /// Fractional measurements (seconds).
    Float(f64),
}

impl ResultValue {
    /// The value as a float.
    pub fn as_f64(&self) -> f64 {
        match *self {
            ResultValue::Integer(v) => v as f64,
            ResultValue::Float(v) => v,
        }
    }
}

impl std::fmt::Display for ResultValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultValue::Integer(v) => write!(f, "{v}"),
            ResultValue::Float(v) => write!(f, "{v}"),
        }
    }
}

/// One published benchmark measurement.
///
/// Serialized field names follow the dashboard's JSON import format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceResult {
    /// Project the benchmark belongs to.
    pub project: String,
    /// Worker that ran the benchmark.
    pub environment: String,
    /// Branch the result is filed under.
    pub branch: String,
    /// Revision that was measured.
    #[serde(rename = "commitid")]
    pub commit_id: String,
    /// Executable under test.
    pub executable: String,
    /// Benchmark name.
    pub benchmark: String,
    /// Headline value.
    pub result_value: ResultValue,
    /// Smallest observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Largest observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Lower quartile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q1: Option<f64>,
    /// Upper quartile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q3: Option<f64>,
    /// Units of `result_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    /// Human-readable title for the units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units_title: Option<String>,
}

impl PerformanceResult {
    /// Attach the five-number summary of a timing sample; the median
    /// becomes the headline value.
    pub fn with_timing(mut self, summary: &TimingSummary) -> Self {
        self.result_value = ResultValue::Float(summary.median);
        self.min = Some(summary.min);
        self.max = Some(summary.max);
        self.q1 = Some(summary.q1);
        self.q3 = Some(summary.q3);
        self
    }

    /// Attach a min/max range.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Attach units metadata.
    pub fn with_units(mut self, units: impl Into<String>, title: Option<&str>) -> Self {
        self.units = Some(units.into());
        self.units_title = title.map(str::to_string);
        self
    }
}
