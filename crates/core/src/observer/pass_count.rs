// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! googletest pass count.

use super::LineObserver;
use once_cell::sync::Lazy;
use regex::Regex;

static PASSED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[  PASSED  \] (\d+) test").expect("valid passed regex"));

/// Reads the number of passing tests from the googletest summary line.
#[derive(Debug, Default)]
pub struct PassCountObserver {
    finished: bool,
    passed: Option<u64>,
}

impl PassCountObserver {
    /// Create an observer waiting for the summary line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of passed tests, once the summary line has been seen.
    pub fn result(&self) -> Option<&u64> {
        self.passed.as_ref()
    }
}

impl LineObserver for PassCountObserver {
    type Output = u64;

    fn consume(&mut self, line: &str) -> Option<u64> {
        if self.finished {
            return None;
        }
        let caps = PASSED_RE.captures(line.trim())?;
        let passed = caps[1].parse().ok()?;
        self.finished = true;
        self.passed = Some(passed);
        Some(passed)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
