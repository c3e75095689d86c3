//! Single-command execution.
//!
//! A [`ProcessRunner`] runs one shell command in a working directory and
//! reports what happened as a [`CommandOutput`]. Runners hold no queue state;
//! the [`QueueEngine`](crate::QueueEngine) decides when to call them.
//!
//! ## Examples
//!
//! ```no_run
//! use std::path::Path;
//! use cmdq_lib::{ProcessRunner, ShellRunner};
//!
//! # async fn example() {
//! let output = ShellRunner::new().run("echo hello", Path::new("/tmp")).await;
//! assert!(output.is_success());
//! assert_eq!(output.stdout.trim(), "hello");
//! # }
//! ```

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::RunError;

/// Shell used by [`ShellRunner::new`].
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// The result of running one command: an optional error plus whatever
/// output was captured.
#[derive(Debug, Default)]
pub struct CommandOutput {
    /// Set when the command could not be launched or exited unsuccessfully.
    pub error: Option<RunError>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Creates a successful output with the given captured text.
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            error: None,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Creates a failed output that still carries captured text.
    pub fn failure(error: RunError, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            error: Some(error),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command launched and exited with status zero.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Future returned by [`ProcessRunner::run`].
pub type RunFuture = Pin<Box<dyn Future<Output = CommandOutput> + Send + 'static>>;

/// Runs a single command string in a working directory.
///
/// The returned future resolves exactly once, when the command has finished.
/// Implementations must not panic on command failure; failures are reported
/// through [`CommandOutput::error`].
pub trait ProcessRunner: Send + Sync + 'static {
    /// Starts `command` rooted at `working_dir`.
    fn run(&self, command: &str, working_dir: &Path) -> RunFuture;
}

/// Runs commands through a POSIX shell, capturing stdout and stderr.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    /// Creates a runner that uses `/bin/sh -c`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    /// Creates a runner that invokes `<shell> -c <command>`.
    #[must_use]
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Returns the shell this runner invokes.
    pub fn shell(&self) -> &Path {
        &self.shell
    }
}

impl ProcessRunner for ShellRunner {
    fn run(&self, command: &str, working_dir: &Path) -> RunFuture {
        let shell = self.shell.clone();
        let command = command.to_string();
        let working_dir = working_dir.to_path_buf();

        Box::pin(async move { run_in_shell(&shell, &command, &working_dir).await })
    }
}

#[tracing::instrument(skip(shell, working_dir), fields(dir = %working_dir.display()))]
async fn run_in_shell(shell: &Path, command: &str, working_dir: &Path) -> CommandOutput {
    debug!("spawning command");

    let result = Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(output) => output,
        Err(source) => {
            debug!(error = %source, "command failed to launch");
            return CommandOutput::failure(
                RunError::Launch {
                    command: command.to_string(),
                    source,
                },
                String::new(),
                String::new(),
            );
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    debug!(code = ?output.status.code(), "command finished");

    if output.status.success() {
        CommandOutput::success(stdout, stderr)
    } else {
        CommandOutput::failure(
            RunError::NonZeroExit {
                command: command.to_string(),
                code: output.status.code(),
                signal: exit_signal(&output.status),
            },
            stdout,
            stderr,
        )
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

/// Runs a command in the background and hands its output to `callback`.
///
/// Returns immediately with the handle of the spawned task; the callback is
/// invoked later, once, from that task. Must be called from within a tokio
/// runtime.
///
/// ## Examples
///
/// ```no_run
/// use std::path::Path;
/// use cmdq_lib::{spawn_command, ShellRunner};
///
/// # async fn example() {
/// let handle = spawn_command(&ShellRunner::new(), "ls", Path::new("."), |output| {
///     println!("{}", output.stdout);
/// });
/// handle.await.unwrap();
/// # }
/// ```
pub fn spawn_command<R, F>(runner: &R, command: &str, working_dir: &Path, callback: F) -> JoinHandle<()>
where
    R: ProcessRunner + ?Sized,
    F: FnOnce(CommandOutput) + Send + 'static,
{
    let future = runner.run(command, working_dir);
    tokio::spawn(async move {
        callback(future.await);
    })
}
