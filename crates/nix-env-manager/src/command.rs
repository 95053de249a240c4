//! External command execution.
//!
//! [`CommandRunner`] is the capability every Nix/host operation in this crate
//! goes through. [`SystemCommandRunner`] spawns real processes with an
//! optional time bound.

use crate::error::NixError;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// One external invocation: an executable and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
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
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Executable that was run.
    pub program: String,

    /// Exit code (-1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout.
    pub stdout: Vec<u8>,

    /// Captured stderr.
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether the process reported success.
    pub success: bool,
}

impl CommandOutput {
    /// Whether this command passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }

    /// Turn a non-zero exit into [`NixError::CommandFailed`].
    pub fn ensure_success(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(NixError::CommandFailed {
                program: self.program,
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Capability to run an external command and capture its output.
///
/// A non-zero exit status is returned as a normal [`CommandOutput`]; only
/// failing to spawn the process or exceeding a time bound is an error.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner {
    /// Upper bound on a single command; 0 disables the bound.
    pub timeout_secs: u64,
}

impl SystemCommandRunner {
    pub fn new(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(command = %spec, "Running command");
        let start = Instant::now();

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => NixError::ProgramNotFound {
                    program: spec.program.clone(),
                },
                _ => NixError::Io(e),
            })?;

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| NixError::Timeout {
                program: spec.program.clone(),
                secs: self.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let result = CommandOutput {
            program: spec.program.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        };

        debug!(
            command = %spec,
            exit_code = result.exit_code,
            duration_ms = result.duration_ms,
            "Command finished"
        );
        if !result.passed() && !result.stderr.is_empty() {
            debug!(command = %spec, stderr = %result.stderr.trim(), "Command diagnostics");
        }

        Ok(result)
    }
}

/// Runner that records every invocation and replays a canned result.
#[cfg(test)]
pub(crate) struct ScriptedRunner {
    pub calls: std::sync::Mutex<Vec<CommandSpec>>,
    exit_code: i32,
    stdout: Vec<u8>,
    stderr: String,
}

#[cfg(test)]
impl ScriptedRunner {
    pub fn new(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            exit_code,
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.to_string(),
        }
    }

    pub fn last_call(&self) -> CommandSpec {
        self.calls
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no command was run")
    }
}

#[cfg(test)]
#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        Ok(CommandOutput {
            program: spec.program.clone(),
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            duration_ms: 0,
            success: self.exit_code == 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(exit_code: i32) -> CommandOutput {
        CommandOutput {
            program: "nix".to_string(),
            exit_code,
            stdout: Vec::new(),
            stderr: "  boom\n".to_string(),
            duration_ms: 5,
            success: exit_code == 0,
        }
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("nix", ["flake", "metadata", "self", "--json"]);
        assert_eq!(spec.to_string(), "nix flake metadata self --json");
    }

    #[test]
    fn test_ensure_success_passes_through() {
        assert!(output(0).ensure_success().is_ok());
    }

    #[test]
    fn test_ensure_success_reports_trimmed_stderr() {
        match output(2).ensure_success() {
            Err(NixError::CommandFailed {
                program,
                exit_code,
                stderr,
            }) => {
                assert_eq!(program, "nix");
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected CommandFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_simple_command() {
        let runner = SystemCommandRunner::new(60);
        let result = runner
            .run(&CommandSpec::new("echo", ["hello"]))
            .await
            .expect("run failed");
        assert!(result.passed());
        assert!(String::from_utf8_lossy(&result.stdout).contains("hello"));
    }

    #[tokio::test]
    async fn test_run_failing_command_is_not_an_error() {
        let runner = SystemCommandRunner::new(60);
        let result = runner
            .run(&CommandSpec::new("false", Vec::<String>::new()))
            .await
            .expect("run failed");
        assert!(!result.passed());
        assert_ne!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = SystemCommandRunner::new(60);
        let err = runner
            .run(&CommandSpec::new(
                "definitely-not-a-real-program-4f1c",
                Vec::<String>::new(),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, NixError::ProgramNotFound { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = SystemCommandRunner::new(1);
        let err = runner
            .run(&CommandSpec::new("sleep", ["5"]))
            .await
            .unwrap_err();
        assert!(matches!(err, NixError::Timeout { secs: 1, .. }));
    }
}
