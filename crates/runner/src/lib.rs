// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pipeline execution for benchwatch.
//!
//! This crate drives the processes of a benchmark pipeline and connects
//! their output to the observers in `benchwatch-core`:
//!
//! - [`process`] - child processes with line streaming, timeouts and
//!   SIGTERM/SIGKILL termination
//! - [`steps`] - the step trait and the concrete measuring, gating and
//!   expanding steps
//! - [`pipeline`] - the sequential step queue
//! - [`publish`] - posting results to the dashboard
//! - [`lock`] - cross-run exclusive file lock
//!
//! # Quick Start
//!
//! ```no_run
//! use benchwatch_benchmarks::{RunContext, RunIdentity};
//! use benchwatch_runner::pipeline::Pipeline;
//! use benchwatch_runner::steps::PerformanceStep;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(identity: RunIdentity) {
//! let pipeline = Pipeline::new("performance")
//!     .with_step(PerformanceStep::time("parameterloading"))
//!     .with_step(PerformanceStep::memory("parameterloading"));
//!
//! let mut run = RunContext::new(identity);
//! let summary = pipeline.run(&mut run, &CancellationToken::new()).await;
//! println!("{} records, overall {}", run.len(), summary.overall());
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod lock;
pub mod pipeline;
pub mod process;
pub mod publish;
pub mod steps;

pub use error::{Result, RunnerError};
pub use pipeline::Pipeline;
pub use publish::{PublishSettings, PublishStep};
pub use steps::{Step, StepContext, StepOutcome};
