// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for benchwatch.
//!
//! This crate holds the pieces of the benchmark runner that never touch a
//! process or the network:
//!
//! - [`observer`] - incremental line observers that recognize results in
//!   free-form command output
//! - [`stats`] - the sample statistics used to summarize timing runs
//! - [`execution`] - step verdicts and per-step reports
//!
//! # Quick Start
//!
//! ```
//! use benchwatch_core::observer::{LineObserver, PassCountObserver};
//!
//! let mut observer = PassCountObserver::new();
//! observer.consume("[==========] 3 tests ran.");
//! observer.consume("[  PASSED  ] 0 tests.");
//!
//! assert_eq!(observer.result(), Some(&0));
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod execution;
pub mod observer;
pub mod stats;

pub use error::{Error, Result};
pub use execution::{DataYield, RunSummary, StepReport, StepStatus};
pub use stats::{MedianConvention, StatsError, TimingSummary};
