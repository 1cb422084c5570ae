//! External tool invocation.
//!
//! A non-zero exit is an ordinary [`CommandResult`]; only a tool that cannot
//! be started at all is an error. The core imposes no timeout. The system
//! runner sets `kill_on_drop`, so a caller that drops the future (timeout,
//! job abort) also kills the child process.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProvisionError, Result};
use crate::types::CommandResult;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_path_buf(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// `program arg1 arg2 ...`, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion and capture the outcome. Blocks (asynchronously)
    /// until the process exits.
    async fn run(&self, invocation: &Invocation) -> Result<CommandResult>;
}

/// Runs tools as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        debug!(cmd = %invocation.display(), cwd = %invocation.cwd.display(), "spawning");
        let start = Instant::now();

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in &invocation.env {
            cmd.env(k, v);
        }

        let output = cmd
            .output()
            .await
            .map_err(|source| ProvisionError::ProcessLaunch {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(CommandResult {
            // Signal-terminated processes have no exit code.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed: start.elapsed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tool detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn available(&self) -> bool {
        self.path.is_some()
    }
}

/// Resolve each program on `PATH` (or as given, if it is already a path).
pub fn detect_tools<'a>(programs: impl IntoIterator<Item = &'a str>) -> Vec<ToolStatus> {
    programs
        .into_iter()
        .map(|name| ToolStatus {
            name: name.to_string(),
            path: which::which(name).ok(),
        })
        .collect()
}
