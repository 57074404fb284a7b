// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by the benchwatch crates.

use crate::stats::StatsError;
use thiserror::Error;

/// Errors raised by core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller supplied an argument that violates a documented contract.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A statistics function was called on too few data points.
    #[error("Statistics error: {0}")]
    Statistics(#[from] StatsError),

    /// Filesystem or pipe failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Build an [`Error::InvalidInput`] from any message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
