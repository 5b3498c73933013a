//! External command execution.
//!
//! Every tool the verifier drives (signature checker, extractor, RAR helper)
//! goes through [`CommandExecutor`], so stages can be exercised with a stub
//! and the system implementation can enforce a deadline on each process.

use crate::error::{Result, VerifyError};
use log::{debug, trace};
use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Output, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command with arguments and returns the captured output.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ToolNotFound`] when the executable does not
    /// exist, [`VerifyError::ToolTimeout`] when it overruns its deadline, and
    /// [`VerifyError::Io`] for any other spawn or pipe failure.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use setupcheck::exec::{CommandExecutor, SystemCommandExecutor};
    ///
    /// let executor = SystemCommandExecutor::default();
    /// let output = executor.run("innoextract", &["--version"])?;
    /// assert!(output.status.success());
    /// # Ok::<(), setupcheck::error::VerifyError>(())
    /// ```
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output>;
}

/// Executes commands on the host system, killing them after `timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor {
    timeout: Option<Duration>,
}

impl SystemCommandExecutor {
    /// Creates an executor with the given deadline; `None` waits forever.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> Result<Output> {
        debug!("running {cmd} {}", args.join(" "));

        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| spawn_error(cmd, err))?;

        // Drain both pipes while waiting, a chatty tool would otherwise block
        // on a full pipe and never exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => wait_with_deadline(&mut child, cmd, limit)?,
            None => child.wait()?,
        };

        let output = Output {
            status,
            stdout: join_drain(stdout)?,
            stderr: join_drain(stderr)?,
        };
        trace!(
            "{cmd} exited with {:?}, {} bytes stdout, {} bytes stderr",
            output.status.code(),
            output.stdout.len(),
            output.stderr.len()
        );
        Ok(output)
    }
}

fn spawn_error(cmd: &str, err: std::io::Error) -> VerifyError {
    if err.kind() == ErrorKind::NotFound {
        VerifyError::ToolNotFound {
            tool: cmd.to_owned(),
        }
    } else {
        VerifyError::Io(err)
    }
}

fn wait_with_deadline(child: &mut Child, cmd: &str, limit: Duration) -> Result<ExitStatus> {
    if let Some(status) = child.wait_timeout(limit)? {
        return Ok(status);
    }

    // Best effort: the process may exit between the timeout and the kill.
    if child.kill().is_err() {
        debug!("{cmd} exited before it could be killed");
    }
    if child.wait().is_err() {
        debug!("failed to reap {cmd} after kill");
    }
    Err(VerifyError::ToolTimeout {
        tool: cmd.to_owned(),
        seconds: limit.as_secs(),
    })
}

type DrainHandle = Option<JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R>(pipe: Option<R>) -> DrainHandle
where
    R: Read + Send + 'static,
{
    pipe.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: DrainHandle) -> Result<Vec<u8>> {
    match handle {
        None => Ok(Vec::new()),
        Some(handle) => handle
            .join()
            .map_err(|_| VerifyError::Io(std::io::Error::other("output reader panicked")))?
            .map_err(VerifyError::from),
    }
}

/// Returns the tool's stdout followed by its stderr as lossy UTF-8.
#[must_use]
pub fn combined_text(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&stderr);
    }
    text
}

/// Returns `true` when `tool` can be spawned at all, whatever its exit status.
pub fn tool_exists(executor: &dyn CommandExecutor, tool: &str) -> bool {
    !matches!(
        executor.run(tool, &["--version"]),
        Err(VerifyError::ToolNotFound { .. })
    )
}
