// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scratch directory setup and cleanup.

use super::{Step, StepContext, StepOutcome};
use crate::Result;
use async_trait::async_trait;
use benchwatch_core::StepStatus;
use std::io;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Remove,
}

/// Creates or removes a directory tree.
#[derive(Debug, Clone)]
pub struct DirectoryStep {
    name: String,
    path: PathBuf,
    action: Action,
    always_run: bool,
}

impl DirectoryStep {
    /// Create `path` and its parents.
    pub fn create(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            action: Action::Create,
            always_run: false,
        }
    }

    /// Remove `path` recursively; runs even after the pipeline halted.
    /// A missing directory is not an error.
    pub fn remove(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            action: Action::Remove,
            always_run: true,
        }
    }
}

#[async_trait]
impl Step for DirectoryStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn always_run(&self) -> bool {
        self.always_run
    }

    async fn run(&self, _ctx: &mut StepContext<'_>) -> Result<StepOutcome> {
        match self.action {
            Action::Create => tokio::fs::create_dir_all(&self.path).await?,
            Action::Remove => match tokio::fs::remove_dir_all(&self.path).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                other => other?,
            },
        }
        info!(step = %self.name, path = %self.path.display(), action = ?self.action, "directory updated");
        Ok(StepOutcome::new(StepStatus::Success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::run_context;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_create_then_remove() {
        let root = tempfile::tempdir().unwrap();
        let datadir = root.path().join("build").join("ibd-datadir");
        let mut run = run_context();
        let mut ctx = StepContext {
            run: &mut run,
            cancel: CancellationToken::new(),
        };

        let create = DirectoryStep::create("Create datadir", &datadir);
        assert!(!create.always_run());
        create.run(&mut ctx).await.unwrap();
        assert!(datadir.is_dir());

        let remove = DirectoryStep::remove("Remove datadir", &datadir);
        assert!(remove.always_run());
        remove.run(&mut ctx).await.unwrap();
        assert!(!datadir.exists());

        let again = remove.run(&mut ctx).await.unwrap();
        assert_eq!(again.status, StepStatus::Success);
    }
}
