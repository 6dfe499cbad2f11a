//! External command execution
//!
//! Every collaborator of the engine (namespace scripts, `tc`, `ip`,
//! `openssl`, `tshark`, the peer tools) is an external program. One-shot
//! commands go through the [`CommandRunner`] seam so tests can script them;
//! long-lived peers are wrapped in [`ChildProcess`].

use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

/// How long a terminated child gets to exit before it is killed
const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
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

    /// Run this command inside a network namespace via `ip netns exec`
    pub fn in_namespace(self, namespace: &str, use_sudo: bool) -> Self {
        let mut wrapped = if use_sudo {
            CommandSpec::new("sudo").arg("ip")
        } else {
            CommandSpec::new("ip")
        };
        wrapped = wrapped.args(["netns", "exec", namespace]);
        wrapped.args.push(self.program);
        wrapped.args.extend(self.args);
        wrapped
    }

    /// Build a tokio command with stdin closed
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        command
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code; `None` when the process died from a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok<S: Into<String>>(stdout: S) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed<S: Into<String>>(code: i32, stderr: S) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short diagnostic for error messages
    pub fn describe_failure(&self) -> String {
        let status = self
            .code
            .map_or("terminated by signal".to_string(), |c| format!("exit code {}", c));
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Seam for one-shot external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion; a nonzero exit is reported in the output, not as an error
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands on the host
#[derive(Debug, Default, Clone)]
pub struct SystemCommandRunner;

impl SystemCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = spec
            .to_command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AppError::process(format!("Failed to run '{}': {}", spec, e)))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// A long-lived child process (peer or capture)
pub struct ChildProcess {
    child: Child,
    display: String,
}

impl ChildProcess {
    /// Spawn with stdout and stderr captured
    pub fn spawn(spec: &CommandSpec) -> Result<Self> {
        let mut command = spec.to_command();
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        Self::spawn_command(spec, command)
    }

    /// Spawn with output discarded
    pub fn spawn_quiet(spec: &CommandSpec) -> Result<Self> {
        let mut command = spec.to_command();
        command.stdout(Stdio::null()).stderr(Stdio::null());
        Self::spawn_command(spec, command)
    }

    fn spawn_command(spec: &CommandSpec, mut command: Command) -> Result<Self> {
        let child = command
            .spawn()
            .map_err(|e| AppError::process(format!("Failed to start '{}': {}", spec, e)))?;
        Ok(Self {
            child,
            display: spec.to_string(),
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    /// Wait for exit while draining both pipes
    pub async fn wait_output(&mut self) -> Result<CommandOutput> {
        let mut stdout = self.child.stdout.take();
        let mut stderr = self.child.stderr.take();

        let read_stdout = async {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout.as_mut() {
                pipe.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr.as_mut() {
                pipe.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        };

        let (status, out, err) = tokio::try_join!(self.child.wait(), read_stdout, read_stderr)
            .map_err(|e| AppError::process(format!("Failed waiting for '{}': {}", self.display, e)))?;

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&out).into_owned(),
            stderr: String::from_utf8_lossy(&err).into_owned(),
        })
    }

    /// Ask the process to stop, escalating to a kill when it lingers.
    ///
    /// SIGTERM is delivered through `kill` so that `sudo` relays it to the
    /// wrapped program.
    pub async fn terminate(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        if let Some(pid) = self.child.id() {
            let _ = Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
        }

        if tokio::time::timeout(TERMINATE_GRACE, self.child.wait()).await.is_err() {
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
    }

    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}
