// src/tools/mod.rs

//! External tool invocation
//!
//! Everything the engine shells out to (git, npm, rsync) goes through one
//! runner: stdin nulled to prevent hangs, stdout/stderr drained on
//! dedicated threads, a configurable timeout enforced with `wait_timeout`,
//! and the child killed when the timeout expires.

pub mod git;
pub mod npm;
pub mod rsync;

pub use git::GitClient;
pub use npm::NpmClient;
pub use rsync::RsyncClient;

use crate::error::{Error, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Default timeout for external tools (10 minutes; npm full installs are slow)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Captured output of a finished tool invocation
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl ToolOutput {
    /// Last non-empty stderr line, the usual one-line failure reason.
    pub fn stderr_trail(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
    }
}

/// One external command invocation
pub struct Tool {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl Tool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            timeout: DEFAULT_TIMEOUT,
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

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run to completion, treating a nonzero exit as a failure.
    pub fn run(self) -> Result<ToolOutput> {
        let program = self.program.clone();
        let output = self.try_run()?;
        if output.success {
            Ok(output)
        } else {
            Err(Error::CommandFailed {
                tool: program,
                reason: format!(
                    "exited with status {}: {}",
                    output.code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    output.stderr_trail()
                ),
            })
        }
    }

    /// Run to completion, handing the exit status back to the caller.
    ///
    /// Spawn failures and timeouts are still errors; a nonzero exit is not.
    pub fn try_run(self) -> Result<ToolOutput> {
        debug!("running {} {}", self.program, self.args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| Error::CommandFailed {
            tool: self.program.clone(),
            reason: format!("failed to spawn: {e}"),
        })?;

        // Drain pipes on their own threads so a chatty child cannot fill
        // the pipe buffer and deadlock against wait_timeout.
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::CommandFailed {
                    tool: self.program,
                    reason: format!("timed out after {}s", self.timeout.as_secs()),
                });
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();

        for line in stderr.lines() {
            debug!("[{}] {}", self.program, line);
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            success: status.success(),
            code: status.code(),
        })
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut source) = source {
            let _ = source.read_to_string(&mut text);
        }
        text
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let output = Tool::new("sh").args(["-c", "echo hello"]).run().unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.success);
    }

    #[test]
    fn test_run_fails_on_nonzero_exit() {
        let err = Tool::new("sh").args(["-c", "echo oops >&2; exit 3"]).run().unwrap_err();
        match err {
            Error::CommandFailed { tool, reason } => {
                assert_eq!(tool, "sh");
                assert!(reason.contains("3"), "{reason}");
                assert!(reason.contains("oops"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_try_run_tolerates_nonzero_exit() {
        let output = Tool::new("sh").args(["-c", "exit 7"]).try_run().unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(7));
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = Tool::new("sleep")
            .arg("30")
            .timeout(Duration::from_millis(100))
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let err = Tool::new("definitely-not-a-real-tool-3141").run().unwrap_err();
        assert!(err.to_string().contains("spawn"));
    }

    #[test]
    fn test_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = Tool::new("pwd").current_dir(dir.path()).run().unwrap();
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }
}
