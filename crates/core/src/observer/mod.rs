// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Incremental line observers.
//!
//! An observer watches the output of a running command one line at a time
//! and recognizes one specific output grammar. It never sees a line twice and
//! never looks ahead, so each call to [`LineObserver::consume`] must decide on
//! the spot whether the line is consumed, accumulated or ignored.
//!
//! Most observers are single-shot: they emit exactly one value, flip to
//! finished and ignore everything afterwards. [`CargoBenchObserver`] is the
//! exception and emits one value per reported benchmark case.
//!
//! Observers treat a missing terminating pattern as "still pending"; deciding
//! that a finished command produced no data is up to the caller.

mod bracketed_json;
mod cargo_bench;
mod pass_count;
mod peak_memory;
mod timestamp_interval;

pub use bracketed_json::BracketedJsonObserver;
pub use cargo_bench::{BenchCase, CargoBenchObserver};
pub use pass_count::PassCountObserver;
pub use peak_memory::PeakMemoryObserver;
pub use timestamp_interval::{
    TimestampIntervalObserver, DEFAULT_END_TAG, DEFAULT_START_TAG, TIMESTAMP_FORMAT,
};

/// One line in, optionally one typed value out.
pub trait LineObserver {
    /// Value extracted from the stream.
    type Output;

    /// Feed the next line (without its terminator).
    ///
    /// Returns the extracted value on the line that completes a match. Once
    /// [`is_finished`](Self::is_finished) is true this is a no-op returning
    /// `None`.
    fn consume(&mut self, line: &str) -> Option<Self::Output>;

    /// Whether the observer has stopped looking at input.
    fn is_finished(&self) -> bool;

    /// Feed every line of an iterator and collect what was extracted.
    fn consume_all<'a, I>(&mut self, lines: I) -> Vec<Self::Output>
    where
        I: IntoIterator<Item = &'a str>,
        Self: Sized,
    {
        lines
            .into_iter()
            .filter_map(|line| self.consume(line))
            .collect()
    }
}
