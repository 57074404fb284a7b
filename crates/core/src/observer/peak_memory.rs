// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Peak heap usage from massif `ms_print` output.

use super::LineObserver;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Detailed snapshots: \[(\d+, )*((\d+) \(peak\)).*\]").expect("valid summary regex")
});

static SNAPSHOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+)\s+[\d,]+\s+([\d,]+)\s+([\d,]+)").expect("valid snapshot regex")
});

/// Extracts the total heap size of the peak snapshot, in bytes.
///
/// The summary line naming the peak snapshot must be seen first; snapshot
/// rows before it are ignored.
#[derive(Debug, Default)]
pub struct PeakMemoryObserver {
    peak: Option<u64>,
    finished: bool,
    total: Option<u64>,
}

impl PeakMemoryObserver {
    /// Create an observer that has not seen the snapshot summary yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the peak snapshot, once the summary line has been seen.
    pub fn peak_snapshot(&self) -> Option<u64> {
        self.peak
    }

    /// Total bytes at the peak snapshot.
    pub fn result(&self) -> Option<&u64> {
        self.total.as_ref()
    }
}

fn strip_separators(digits: &str) -> String {
    digits.chars().filter(|c| *c != ',').collect()
}

impl LineObserver for PeakMemoryObserver {
    type Output = u64;

    fn consume(&mut self, line: &str) -> Option<u64> {
        if self.finished {
            return None;
        }
        let line = line.trim();

        let Some(peak) = self.peak else {
            if let Some(caps) = SUMMARY_RE.captures(line) {
                self.peak = caps.get(3).and_then(|m| m.as_str().parse().ok());
                debug!(peak = ?self.peak, "peak snapshot located");
            }
            return None;
        };

        let caps = SNAPSHOT_RE.captures(line)?;
        let index: u64 = caps[1].parse().ok()?;
        if index != peak {
            return None;
        }

        self.finished = true;
        self.total = strip_separators(&caps[2]).parse().ok();
        debug!(snapshot = index, total = ?self.total, "peak snapshot row parsed");
        self.total
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_row_total() {
        let mut observer = PeakMemoryObserver::new();
        assert_eq!(observer.consume("Detailed snapshots: [1, 2 (peak)]"), None);
        assert_eq!(observer.peak_snapshot(), Some(2));
        assert_eq!(observer.consume("2    100   4,096   2,048"), Some(4096));
        assert!(observer.is_finished());
        assert_eq!(observer.result(), Some(&4096));
    }

    #[test]
    fn test_ms_print_layout() {
        let output = "\
--------------------------------------------------------------------------------
Command:            ./src/zcash-gtest --gtest_filter=*
Massif arguments:   --time-unit=B
--------------------------------------------------------------------------------
Number of snapshots: 21
 Detailed snapshots: [3, 9, 14 (peak), 19]
--------------------------------------------------------------------------------
  n        time(B)         total(B)   useful-heap(B) extra-heap(B)    stacks(B)
--------------------------------------------------------------------------------
  0              0                0                0             0            0
 13    912,003,112      810,555,928      809,969,312       586,616            0
 14  1,001,283,736    1,024,411,160    1,023,820,912       590,248            0
 15  1,100,000,000      700,000,000      699,000,000     1,000,000            0";
        let mut observer = PeakMemoryObserver::new();
        let out = observer.consume_all(output.lines());
        assert_eq!(out, vec![1_024_411_160]);
        assert_eq!(observer.peak_snapshot(), Some(14));
    }

    #[test]
    fn test_rows_before_summary_are_ignored() {
        let mut observer = PeakMemoryObserver::new();
        assert_eq!(observer.consume("2    100   4,096   2,048"), None);
        assert!(!observer.is_finished());
        observer.consume("Detailed snapshots: [2 (peak)]");
        assert_eq!(observer.consume("1    50   1,000   900"), None);
        assert_eq!(observer.consume("2    100   8,192   8,000"), Some(8192));
    }

    #[test]
    fn test_without_peak_never_finishes() {
        let mut observer = PeakMemoryObserver::new();
        observer.consume("Detailed snapshots: [1, 2, 3]");
        observer.consume("2    100   4,096   2,048");
        assert!(!observer.is_finished());
        assert_eq!(observer.result(), None);
    }

    #[test]
    fn test_consume_after_finish_is_noop() {
        let mut observer = PeakMemoryObserver::new();
        observer.consume("Detailed snapshots: [0 (peak)]");
        observer.consume("0  10  123  100");
        assert_eq!(observer.consume("0  10  999  100"), None);
        assert_eq!(observer.result(), Some(&123));
    }
}
