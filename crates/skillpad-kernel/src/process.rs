//! External process launching.
//!
//! [`ProcessRunner`] is the seam between the command queue and the OS.  The
//! production implementation, [`TokioProcessRunner`], wraps
//! `tokio::process::Command`; tests substitute a scripted runner.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{KernelError, Result};

/// A fully specified program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program name or path, resolved through `PATH`.
    pub program: String,
    /// Arguments, passed verbatim (no shell interpretation).
    pub args: Vec<String>,
    /// Working directory; inherits the current one when `None`.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Run the program inside `cwd`.
    pub fn current_dir(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    /// `program arg1 arg2`, for log lines.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Launches a program and waits for it to exit.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut command = tokio::process::Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let child = command.spawn().map_err(|e| KernelError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| KernelError::Wait {
                program: spec.program.clone(),
                reason: e.to_string(),
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(command = %spec.display(), exit_code, "process exited");

        Ok(CommandOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("npx", ["-y", "skills", "list"]);
        assert_eq!(spec.display(), "npx -y skills list");
        assert_eq!(CommandSpec::new("true", Vec::<String>::new()).display(), "true");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_real_process_and_captures_output() {
        let spec = CommandSpec::new("sh", ["-c", "echo out; echo err >&2; exit 3"]);
        let output = TokioProcessRunner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, 3);
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert!(!output.success());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let spec = CommandSpec::new("skillpad-definitely-not-a-program", ["x"]);
        let err = TokioProcessRunner.run(&spec).await.unwrap_err();
        assert!(matches!(err, KernelError::Spawn { .. }));
    }
}
