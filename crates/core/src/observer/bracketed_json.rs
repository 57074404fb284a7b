// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Timing results printed as a JSON array of runs.
//!
//! The measurement script prints something like
//!
//! ```text
//! Running benchmark createjoinsplit 10 times
//! [
//!   {"runningtime": 21.38},
//!   {"runningtime": 20.97}
//! ]
//! ```
//!
//! possibly surrounded by unrelated chatter. Everything from the first `[` to
//! the first `]` after it is reassembled and parsed.

use super::LineObserver;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct Run {
    runningtime: f64,
}

/// Collects the `runningtime` of every element of a bracketed JSON array.
#[derive(Debug, Default)]
pub struct BracketedJsonObserver {
    content: String,
    parsing: bool,
    finished: bool,
    sample: Option<Vec<f64>>,
}

impl BracketedJsonObserver {
    /// Create an observer that has not seen an opening bracket yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The extracted sample, if the array parsed and was non-empty.
    pub fn result(&self) -> Option<&[f64]> {
        self.sample.as_deref()
    }

    /// Whether an opening bracket has been seen.
    pub fn is_parsing(&self) -> bool {
        self.parsing && !self.finished
    }

    fn append_until_close(&mut self, text: &str) -> Option<Vec<f64>> {
        match text.find(']') {
            Some(end) => {
                self.content.push_str(&text[..=end]);
                self.complete()
            }
            None => {
                self.content.push_str(text);
                None
            }
        }
    }

    fn complete(&mut self) -> Option<Vec<f64>> {
        self.finished = true;

        // The first `]` closes the array; a nested array inside an element
        // makes the text unparseable and the run yields no data.
        let runs: Vec<Run> = match serde_json::from_str(&self.content) {
            Ok(runs) => runs,
            Err(e) => {
                warn!(error = %e, "discarding malformed timing output");
                return None;
            }
        };

        if runs.is_empty() {
            debug!("timing output contained no runs");
            return None;
        }

        let sample: Vec<f64> = runs.into_iter().map(|r| r.runningtime).collect();
        debug!(runs = sample.len(), "timing sample extracted");
        self.sample = Some(sample.clone());
        Some(sample)
    }
}

impl LineObserver for BracketedJsonObserver {
    type Output = Vec<f64>;

    fn consume(&mut self, line: &str) -> Option<Vec<f64>> {
        if self.finished {
            return None;
        }

        if self.parsing {
            self.content.push('\n');
            return self.append_until_close(line);
        }

        let start = line.find('[')?;
        self.parsing = true;
        self.append_until_close(&line[start..])
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
