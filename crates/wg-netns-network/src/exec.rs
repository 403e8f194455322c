//! External process execution.
//!
//! Every change to namespaces, links and wireguard state goes through a
//! [`ProcessExecutor`]. The production implementation, [`SystemExecutor`],
//! spawns the program and waits for it; tests substitute a simulated network.

use std::fmt;
use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use wg_netns_common::{NetnsError, NetnsResult};

/// A single external command.
///
/// Secret material travels in [`Invocation::stdin`] and is never part of the
/// argument vector or the debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
    capture: bool,
    check: bool,
}

impl Invocation {
    /// Create an invocation that checks the exit code and streams output.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            capture: false,
            check: true,
        }
    }

    /// Pipe `input` to the process' standard input.
    #[must_use]
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Capture stdout and stderr instead of inheriting them.
    #[must_use]
    pub const fn captured(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Set whether a non-zero exit code is an error.
    #[must_use]
    pub const fn checked(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after the program name.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Full argument vector including the program.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Standard-input payload, if any.
    #[must_use]
    pub fn stdin(&self) -> Option<&str> {
        self.stdin.as_deref()
    }

    /// Whether output is captured.
    #[must_use]
    pub const fn capture(&self) -> bool {
        self.capture
    }

    /// Whether a non-zero exit code is an error.
    #[must_use]
    pub const fn check(&self) -> bool {
        self.check
    }

    /// Space-joined command line, safe to log.
    #[must_use]
    pub fn command_line(&self) -> String {
        self.argv().join(" ")
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("argv", &self.argv())
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .field("capture", &self.capture)
            .field("check", &self.check)
            .finish()
    }
}

/// Runs external programs.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run the invocation to completion and return its standard output.
    ///
    /// Output is only collected when the invocation is captured; otherwise the
    /// returned string is empty.
    ///
    /// # Errors
    ///
    /// Returns [`NetnsError::Spawn`] if the program cannot be started and
    /// [`NetnsError::Execution`] if it exits non-zero while checked.
    async fn execute(&self, invocation: &Invocation) -> NetnsResult<String>;
}

/// Executes invocations as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn execute(&self, invocation: &Invocation) -> NetnsResult<String> {
        tracing::debug!(
            stdin = invocation.stdin().is_some(),
            "> {}",
            invocation.command_line()
        );

        let spawn_error = |source| NetnsError::Spawn {
            program: invocation.program().to_string(),
            source,
        };

        let mut command = Command::new(invocation.program());
        command.args(invocation.args()).kill_on_drop(true);
        if invocation.stdin().is_some() {
            command.stdin(Stdio::piped());
        }
        if invocation.capture() {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = command.spawn().map_err(spawn_error)?;

        if let (Some(input), Some(mut pipe)) = (invocation.stdin(), child.stdin.take()) {
            // A child that exits without reading its input closes the pipe
            // early; its exit status is what gets reported.
            match pipe.write_all(input.as_bytes()).await {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!("Child closed stdin before reading it");
                }
                result => result.map_err(spawn_error)?,
            }
            // Dropping the pipe closes it so the child sees EOF.
        }

        let output = child.wait_with_output().await.map_err(spawn_error)?;

        if !output.status.success() {
            if invocation.check() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                let message = if stderr.is_empty() {
                    output.status.code().map_or_else(
                        || "terminated by signal".to_string(),
                        |code| format!("exit code {code}"),
                    )
                } else {
                    stderr.to_string()
                };
                return Err(NetnsError::Execution {
                    command: invocation.command_line(),
                    exit_code: output.status.code(),
                    message,
                });
            }
            tracing::debug!(status = %output.status, "Ignoring failed command");
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
