// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Performance records for benchwatch.
//!
//! Steps turn extracted values into [`PerformanceResult`]s and append them to
//! the run's [`RunContext`]. At the end of a run the context is serialized for
//! publication and written to disk.
//!
//! # Quick Start
//!
//! ```
//! use benchwatch_benchmarks::{ResultValue, RunContext, RunIdentity};
//!
//! let mut ctx = RunContext::new(RunIdentity {
//!     project: "Zcash".to_string(),
//!     executable: "zcash".to_string(),
//!     environment: "perf-worker-1".to_string(),
//!     commit_id: "abc123".to_string(),
//!     branch: "master".to_string(),
//!     published_branch: None,
//! });
//!
//! let record = ctx.identity().record("memory sleep", ResultValue::Integer(4096));
//! ctx.append(record);
//!
//! assert_eq!(ctx.results().len(), 1);
//! ```
//!
//! # Modules
//!
//! - [`result`] - the published `PerformanceResult` record
//! - [`run`] - run identity and the append-only `RunContext`
//! - [`io`] - reading and writing run outputs
//! - [`markdown`] - markdown report generation

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod io;
pub mod markdown;
pub mod result;
pub mod run;

pub use result::{PerformanceResult, ResultValue};
pub use run::{RunContext, RunIdentity};
