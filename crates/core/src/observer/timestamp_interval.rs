// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Elapsed time between two timestamped log lines.
//!
//! Used to time the initial block download of a node: the node logs its
//! version banner when it starts and a fixed message when it leaves IBD. Once
//! the end line is seen the node has nothing more to say, so the observer
//! cancels the token it was handed and the runner owning the process shuts
//! it down.

use super::LineObserver;
use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// `strftime` layout of the leading timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Tag following the timestamp on the start line.
pub const DEFAULT_START_TAG: &str = "Zcash version";

/// Tag following the timestamp on the end line.
pub const DEFAULT_END_TAG: &str = "Leaving InitialBlockDownload";

static DEFAULT_START_RE: Lazy<Regex> =
    Lazy::new(|| tagged_line(DEFAULT_START_TAG).expect("valid start regex"));

static DEFAULT_END_RE: Lazy<Regex> =
    Lazy::new(|| tagged_line(DEFAULT_END_TAG).expect("valid end regex"));

fn tagged_line(tag: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!(r"^([\d-]+ [\d:]+) {}", regex::escape(tag)))
}

fn leading_timestamp(re: &Regex, line: &str) -> Option<NaiveDateTime> {
    let caps = re.captures(line)?;
    NaiveDateTime::parse_from_str(&caps[1], TIMESTAMP_FORMAT).ok()
}

/// Measures seconds between a start-tagged and an end-tagged line.
#[derive(Debug)]
pub struct TimestampIntervalObserver {
    start_re: Regex,
    end_re: Regex,
    start: Option<NaiveDateTime>,
    finished: bool,
    elapsed: Option<f64>,
    stop: CancellationToken,
}

impl TimestampIntervalObserver {
    /// Observer for the node's IBD start and end lines.
    ///
    /// `stop` is cancelled once the end line is seen.
    pub fn new(stop: CancellationToken) -> Self {
        Self {
            start_re: DEFAULT_START_RE.clone(),
            end_re: DEFAULT_END_RE.clone(),
            start: None,
            finished: false,
            elapsed: None,
            stop,
        }
    }

    /// Observer for custom start and end tags.
    pub fn with_tags(start_tag: &str, end_tag: &str, stop: CancellationToken) -> Result<Self> {
        if start_tag.trim().is_empty() || end_tag.trim().is_empty() {
            return Err(Error::invalid_input("interval tags must not be empty"));
        }
        let start_re = tagged_line(start_tag).map_err(|e| Error::invalid_input(e.to_string()))?;
        let end_re = tagged_line(end_tag).map_err(|e| Error::invalid_input(e.to_string()))?;

        Ok(Self {
            start_re,
            end_re,
            start: None,
            finished: false,
            elapsed: None,
            stop,
        })
    }

    /// Start timestamp, once seen.
    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// Elapsed seconds between start and end.
    pub fn result(&self) -> Option<&f64> {
        self.elapsed.as_ref()
    }

    /// Whether the observer asked for the process to be stopped.
    pub fn requested_stop(&self) -> bool {
        self.finished
    }
}

impl LineObserver for TimestampIntervalObserver {
    type Output = f64;

    fn consume(&mut self, line: &str) -> Option<f64> {
        if self.finished {
            return None;
        }
        let line = line.trim();

        let Some(start) = self.start else {
            self.start = leading_timestamp(&self.start_re, line);
            if let Some(start) = self.start {
                debug!(%start, "interval start line seen");
            }
            return None;
        };

        let end = leading_timestamp(&self.end_re, line)?;
        let elapsed = end.signed_duration_since(start).num_seconds() as f64;
        self.finished = true;
        self.elapsed = Some(elapsed);

        info!(%start, %end, elapsed, "interval end line seen, requesting process stop");
        self.stop.cancel();
        Some(elapsed)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
