// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Child process execution with line streaming.
//!
//! [`run_streaming`] spawns one command and hands every line it produces to a
//! callback as soon as it arrives. Lines come from three sources:
//!
//! - the child's stdout and stderr pipes
//! - an optional log file the child writes to, tailed with `linemux`
//!
//! The run ends when the child has exited and its pipes are drained. A
//! cancellation token or an optional timeout stops the child early: it gets
//! `SIGTERM`, then `SIGKILL` once the grace period has elapsed. Lines keep
//! flowing to the callback during the grace period.

use crate::error::{Result, RunnerError};
use linemux::MuxedLines;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Grace period between `SIGTERM` and `SIGKILL` unless a step sets its own.
pub const DEFAULT_SIGTERM_GRACE: Duration = Duration::from_secs(10);

/// How long to wait for further log file lines once the child has exited.
pub const LOG_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

static ENV_VAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Where a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSource {
    /// Child stdout.
    Stdout,
    /// Child stderr.
    Stderr,
    /// The watched log file.
    LogFile,
}

/// A command to run, with its environment and termination policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Extra environment; `${VAR}` references are expanded from the
    /// runner's own environment.
    pub env: BTreeMap<String, String>,
    /// Working directory (inherited when unset).
    pub workdir: Option<PathBuf>,
    /// Wall-clock limit; unlimited when unset.
    pub timeout: Option<Duration>,
    /// Time between `SIGTERM` and `SIGKILL`.
    pub sigterm_grace: Duration,
    /// Log file to tail alongside the pipes.
    pub logfile: Option<PathBuf>,
}

impl CommandSpec {
    /// A command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            workdir: None,
            timeout: None,
            sigterm_grace: DEFAULT_SIGTERM_GRACE,
            logfile: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set one environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set several environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Run in `dir`.
    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Terminate the command after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Grace period between `SIGTERM` and `SIGKILL`.
    pub fn sigterm_grace(mut self, grace: Duration) -> Self {
        self.sigterm_grace = grace;
        self
    }

    /// Tail `path` while the command runs.
    pub fn watch_logfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.logfile = Some(path.into());
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k, expand_env(v))))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Expand `${VAR}` references from the current environment. Unset
/// variables expand to the empty string.
pub fn expand_env(value: &str) -> String {
    ENV_VAR_RE
        .replace_all(value, |caps: &Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

/// How a process run ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Exit code; `None` when the child was killed by a signal.
    pub exit_code: Option<i32>,
    /// The stop token was cancelled while the child was running.
    pub stop_requested: bool,
    /// The timeout elapsed while the child was running.
    pub timed_out: bool,
}

impl ProcessOutcome {
    /// Whether the child exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    fn from_status(status: ExitStatus, stop_requested: bool, timed_out: bool) -> Self {
        Self {
            exit_code: status.code(),
            stop_requested,
            timed_out,
        }
    }
}

type LineReader<R> = Split<BufReader<R>>;

async fn next_segment<R>(reader: &mut Option<LineReader<R>>) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.next_segment().await,
        None => std::future::pending().await,
    }
}

async fn next_log_line(logs: &mut Option<MuxedLines>) -> io::Result<Option<String>> {
    match logs {
        Some(logs) => Ok(logs.next_line().await?.map(|line| line.line().to_string())),
        None => std::future::pending().await,
    }
}

async fn sleep_until(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn decode(segment: &[u8]) -> String {
    let line = String::from_utf8_lossy(segment);
    line.strip_suffix('\r').unwrap_or(&line).to_string()
}

async fn watch_logfile(path: &Path) -> io::Result<MuxedLines> {
    let mut lines = MuxedLines::new()?;
    lines.add_file(path).await?;
    Ok(lines)
}

#[cfg(unix)]
fn request_termination(child: &mut Child) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(io::Error::from),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) -> io::Result<()> {
    child.start_kill()
}

/// Deliver lines still queued on the watched log file. Stops at the first
/// quiet period of [`LOG_DRAIN_TIMEOUT`].
async fn drain_logfile<F>(logs: &mut MuxedLines, on_line: &mut F)
where
    F: FnMut(LineSource, &str),
{
    loop {
        match tokio::time::timeout(LOG_DRAIN_TIMEOUT, logs.next_line()).await {
            Ok(Ok(Some(line))) => on_line(LineSource::LogFile, line.line()),
            Ok(Ok(None)) | Err(_) => break,
            Ok(Err(e)) => {
                warn!(error = %e, "log file watch failed");
                break;
            }
        }
    }
}

fn terminate(child: &mut Child) {
    // The child may have exited between the last poll and the signal.
    if let Err(e) = request_termination(child) {
        warn!(error = %e, "SIGTERM failed");
    }
}

/// Run `spec`, calling `on_line` for every line of output in arrival order.
///
/// The log file watch, when configured, is registered before the child is
/// spawned so that a log file created by the child is read from its first
/// line. A log file that already exists is tailed from its current end.
pub async fn run_streaming<F>(
    spec: &CommandSpec,
    stop: &CancellationToken,
    mut on_line: F,
) -> Result<ProcessOutcome>
where
    F: FnMut(LineSource, &str) + Send,
{
    let mut logfile = match &spec.logfile {
        Some(path) => Some(watch_logfile(path).await?),
        None => None,
    };

    let mut child = spec.to_command().spawn().map_err(|source| RunnerError::Spawn {
        command: spec.to_string(),
        source,
    })?;
    info!(command = %spec, pid = ?child.id(), "process started");

    let mut stdout = child
        .stdout
        .take()
        .map(|pipe| BufReader::new(pipe).split(b'\n'));
    let mut stderr = child
        .stderr
        .take()
        .map(|pipe| BufReader::new(pipe).split(b'\n'));

    let deadline = spec.timeout.map(|t| Instant::now() + t);
    let mut kill_at: Option<Instant> = None;
    let mut killed = false;
    let mut stop_requested = false;
    let mut timed_out = false;
    let mut status: Option<ExitStatus> = None;

    loop {
        tokio::select! {
            segment = next_segment(&mut stdout) => match segment {
                Ok(Some(bytes)) => on_line(LineSource::Stdout, &decode(&bytes)),
                Ok(None) => stdout = None,
                Err(e) => {
                    warn!(error = %e, "stdout read failed");
                    stdout = None;
                }
            },
            segment = next_segment(&mut stderr) => match segment {
                Ok(Some(bytes)) => on_line(LineSource::Stderr, &decode(&bytes)),
                Ok(None) => stderr = None,
                Err(e) => {
                    warn!(error = %e, "stderr read failed");
                    stderr = None;
                }
            },
            line = next_log_line(&mut logfile) => match line {
                Ok(Some(line)) => on_line(LineSource::LogFile, &line),
                Ok(None) => logfile = None,
                Err(e) => {
                    warn!(error = %e, "log file watch failed");
                    logfile = None;
                }
            },
            exit = child.wait(), if status.is_none() => {
                status = Some(exit?);
            }
            _ = stop.cancelled(), if status.is_none() && kill_at.is_none() => {
                info!(command = %spec, "stop requested, sending SIGTERM");
                stop_requested = true;
                kill_at = Some(Instant::now() + spec.sigterm_grace);
                terminate(&mut child);
            }
            _ = sleep_until(deadline), if status.is_none() && kill_at.is_none() => {
                warn!(command = %spec, timeout = ?spec.timeout, "timed out, sending SIGTERM");
                timed_out = true;
                kill_at = Some(Instant::now() + spec.sigterm_grace);
                terminate(&mut child);
            }
            _ = sleep_until(kill_at), if status.is_none() && !killed => {
                warn!(command = %spec, grace = ?spec.sigterm_grace, "still running after SIGTERM, killing");
                killed = true;
                if let Err(e) = child.start_kill() {
                    warn!(error = %e, "SIGKILL failed");
                }
            }
        }

        if let Some(status) = status {
            // After a stop the pipes may be held open by grandchildren.
            let drained = stdout.is_none() && stderr.is_none();
            if drained || kill_at.is_some() {
                if let Some(logs) = logfile.as_mut() {
                    drain_logfile(logs, &mut on_line).await;
                }
                let outcome = ProcessOutcome::from_status(status, stop_requested, timed_out);
                debug!(command = %spec, ?outcome, "process finished");
                return Ok(outcome);
            }
        }
    }
}

/// Run `spec` and return its stdout as one string alongside the outcome.
///
/// Stderr lines are logged at debug level.
pub async fn run_captured(
    spec: &CommandSpec,
    stop: &CancellationToken,
) -> Result<(ProcessOutcome, String)> {
    let mut stdout = String::new();
    let outcome = run_streaming(spec, stop, |source, line| match source {
        LineSource::Stdout => {
            stdout.push_str(line);
            stdout.push('\n');
        }
        _ => debug!(command = %spec, "{line}"),
    })
    .await?;
    Ok((outcome, stdout))
}
