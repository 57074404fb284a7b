// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for pipeline execution.

use benchwatch_core::StatsError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running pipeline steps.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The command could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Rendered command line.
        command: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The cross-run lock could not be taken.
    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        /// Lock file path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// I/O error while driving a process or touching the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Sample statistics could not be computed.
    #[error("statistics error: {0}")]
    Statistics(#[from] StatsError),

    /// Invalid observer setup or other core error.
    #[error(transparent)]
    Core(#[from] benchwatch_core::Error),

    /// Results could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The publisher could not be configured.
    #[error("publisher setup failed: {0}")]
    PublishSetup(String),

    /// HTTP transport error while publishing.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A blocking helper task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_names_command() {
        let err = RunnerError::Spawn {
            command: "./src/zcashd -datadir=ibd-datadir".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };
        assert_eq!(
            err.to_string(),
            "failed to spawn `./src/zcashd -datadir=ibd-datadir`: No such file or directory"
        );
    }

    #[test]
    fn test_statistics_error_converts() {
        let err: RunnerError = StatsError::EmptySample.into();
        assert!(matches!(err, RunnerError::Statistics(StatsError::EmptySample)));
    }
}
