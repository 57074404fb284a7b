// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cross-run exclusive file lock.
//!
//! Steps that mutate state shared between runs on one worker (the proving
//! parameter cache) hold a [`FileLock`] for their whole duration. The lock is
//! an advisory `flock` on a lock file and is released when the guard drops.

use crate::error::{Result, RunnerError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Held exclusive lock; released on drop.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
}

impl FileLock {
    /// Wait until the lock at `path` can be taken exclusively.
    pub async fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock_path = path.clone();
        info!(path = %path.display(), "waiting for lock");

        let file = tokio::task::spawn_blocking(move || -> io::Result<File> {
            let file = open_lock_file(&lock_path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await?
        .map_err(|source| RunnerError::Lock {
            path: path.clone(),
            source,
        })?;

        debug!(path = %path.display(), "lock acquired");
        Ok(Self { _file: file, path })
    }

    /// Take the lock if nobody else holds it.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Option<Self>> {
        let path = path.into();
        let lock_err = |source| RunnerError::Lock {
            path: path.clone(),
            source,
        };
        let file = open_lock_file(&path).map_err(lock_err)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { _file: file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(lock_err(e)),
        }
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
