// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run-scoped result accumulation.
//!
//! A [`RunContext`] is created when a pipeline starts, handed by mutable
//! reference to every step, and serialized once for publication at the end.
//! It is append-only: records can be added and read, never removed or
//! changed.

use crate::result::{PerformanceResult, ResultValue};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Identity shared by every record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Project name, e.g. `Zcash`.
    pub project: String,
    /// Executable name, e.g. `zcash`.
    pub executable: String,
    /// Worker name.
    pub environment: String,
    /// Revision being measured.
    pub commit_id: String,
    /// Branch that was checked out.
    pub branch: String,
    /// Branch results are filed under when it differs from `branch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_branch: Option<String>,
}

impl RunIdentity {
    /// Branch results are filed under.
    pub fn published_branch(&self) -> &str {
        self.published_branch.as_deref().unwrap_or(&self.branch)
    }

    /// Start a record for `benchmark` filed under the published branch.
    pub fn record(&self, benchmark: impl Into<String>, value: ResultValue) -> PerformanceResult {
        PerformanceResult {
            project: self.project.clone(),
            environment: self.environment.clone(),
            branch: self.published_branch().to_string(),
            commit_id: self.commit_id.clone(),
            executable: self.executable.clone(),
            benchmark: benchmark.into(),
            result_value: value,
            min: None,
            max: None,
            q1: None,
            q3: None,
            units: None,
            units_title: None,
        }
    }
}

/// Ordered, append-only list of records produced by one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    run_id: Uuid,
    identity: RunIdentity,
    results: Vec<PerformanceResult>,
}

impl RunContext {
    /// Open a run for the given identity.
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            identity,
            results: Vec::new(),
        }
    }

    /// Unique id of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Identity shared by the run's records.
    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Append a record.
    pub fn append(&mut self, result: PerformanceResult) {
        debug!(
            run_id = %self.run_id,
            benchmark = %result.benchmark,
            value = %result.result_value,
            "result recorded"
        );
        self.results.push(result);
    }

    /// Records in the order they were appended.
    pub fn results(&self) -> &[PerformanceResult] {
        &self.results
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// JSON array of all records, as handed to the publisher.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.results)
    }
}
