// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! `cargo bench` (libtest) result lines.

use super::LineObserver;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static BENCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"test\s([^\s]+).+bench:\s+([\d,]+).+\s([\d,]+)").expect("valid bench regex")
});

/// One benchmark case as reported by libtest, in ns/iter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchCase {
    /// Benchmark path, e.g. `bls12_381::bench_pairing`.
    pub name: String,
    /// Median time per iteration.
    pub median: u64,
    /// Max minus min of the iteration times.
    pub spread: u64,
}

impl BenchCase {
    /// Lower edge of the reported spread.
    pub fn min(&self) -> f64 {
        self.median as f64 - self.spread as f64 / 2.0
    }

    /// Upper edge of the reported spread.
    pub fn max(&self) -> f64 {
        self.median as f64 + self.spread as f64 / 2.0
    }
}

fn parse_grouped(digits: &str) -> Option<u64> {
    digits.replace(',', "").parse().ok()
}

/// Emits a [`BenchCase`] for every bench line; never finishes.
#[derive(Debug, Default)]
pub struct CargoBenchObserver {
    matched: usize,
}

impl CargoBenchObserver {
    /// Create an observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cases seen so far.
    pub fn matched(&self) -> usize {
        self.matched
    }
}

impl LineObserver for CargoBenchObserver {
    type Output = BenchCase;

    fn consume(&mut self, line: &str) -> Option<BenchCase> {
        let caps = BENCH_RE.captures(line.trim())?;
        let case = BenchCase {
            name: caps[1].to_string(),
            median: parse_grouped(&caps[2])?,
            spread: parse_grouped(&caps[3])?,
        };
        self.matched += 1;
        Some(case)
    }

    fn is_finished(&self) -> bool {
        false
    }
}
