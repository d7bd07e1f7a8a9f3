// src/exec/supervisor.rs

//! Supervision of the deployed application process.
//!
//! - [`ManagedProcess`] wraps one spawned child: stdin is closed right after
//!   spawning, and termination is graceful (SIGTERM, then wait, re-sending on
//!   every poll until the child is gone).
//! - [`ProcessSupervisor`] owns at most one `ManagedProcess` at a time and
//!   refuses to start a second one while the first is alive.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::errors::{Result, RunSourceError};
use crate::exec::command::{for_each_line, CommandSpec};

/// Where the child's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Share our stdout/stderr with the child.
    #[default]
    Inherit,
    /// Pipe the child's output and forward each line to the log.
    Capture,
}

/// Handle to a running child. Not shared; owned by one caller.
#[derive(Debug)]
pub struct ManagedProcess {
    child: Child,
    pid: Option<u32>,
    command_line: String,
    signals_sent: u32,
}

impl ManagedProcess {
    /// Spawn `spec` with stdin closed.
    pub fn spawn(spec: &CommandSpec, mode: OutputMode) -> Result<Self> {
        let command_line = spec.command_line();

        let mut cmd = Command::new(spec.program());
        cmd.args(spec.args()).stdin(Stdio::piped()).kill_on_drop(true);

        match mode {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
        }

        let mut child = cmd.spawn().map_err(|source| RunSourceError::SpawnFailed {
            command_line: command_line.clone(),
            source,
        })?;

        // The application never gets interactive input.
        drop(child.stdin.take());

        let pid = child.id();

        if mode == OutputMode::Capture {
            forward_output(&mut child, pid);
        }

        info!(pid = ?pid, cmd = %command_line, "application process started");

        Ok(Self {
            child,
            pid,
            command_line,
            signals_sent: 0,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    /// Number of termination signals delivered so far.
    pub fn signals_sent(&self) -> u32 {
        self.signals_sent
    }

    /// Non-blocking liveness check. Reaps the child if it has exited.
    pub fn has_exited(&mut self) -> Result<bool> {
        Ok(self.child.try_wait()?.is_some())
    }

    /// Gracefully terminate the child and return its exit code.
    ///
    /// Sends SIGTERM, then waits up to `poll` for the child to exit, and
    /// repeats until it does. There is no escalation to SIGKILL and no
    /// overall deadline: a child that ignores SIGTERM keeps this call
    /// blocked. An already-exited child returns immediately with no signal.
    pub async fn terminate(&mut self, poll: Duration) -> Result<i32> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                let code = status.code().unwrap_or(-1);
                debug!(pid = ?self.pid, exit_code = code, "application process has exited");
                return Ok(code);
            }

            self.send_terminate_signal()?;

            match tokio::time::timeout(poll, self.child.wait()).await {
                Ok(status) => {
                    let code = status?.code().unwrap_or(-1);
                    debug!(pid = ?self.pid, exit_code = code, "application process terminated");
                    return Ok(code);
                }
                Err(_) => {
                    debug!(
                        pid = ?self.pid,
                        signals_sent = self.signals_sent,
                        "application still running; re-sending termination signal"
                    );
                }
            }
        }
    }

    #[cfg(unix)]
    fn send_terminate_signal(&mut self) -> Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.pid else {
            return Ok(());
        };

        self.signals_sent += 1;
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(RunSourceError::IoError(std::io::Error::from(e))),
        }
    }

    #[cfg(not(unix))]
    fn send_terminate_signal(&mut self) -> Result<()> {
        self.signals_sent += 1;
        self.child.start_kill()?;
        Ok(())
    }
}

fn forward_output(child: &mut Child, pid: Option<u32>) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(for_each_line(stdout, move |line| {
            info!(target: "runsource::app", pid = ?pid, "{}", line);
        }));
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(for_each_line(stderr, move |line| {
            warn!(target: "runsource::app", pid = ?pid, "{}", line);
        }));
    }
}

/// Owns the (single) application process of a deployment run.
#[derive(Debug)]
pub struct ProcessSupervisor {
    current: Option<ManagedProcess>,
    output_mode: OutputMode,
    terminate_poll: Duration,
}

impl ProcessSupervisor {
    pub fn new(output_mode: OutputMode, terminate_poll: Duration) -> Self {
        Self {
            current: None,
            output_mode,
            terminate_poll,
        }
    }

    /// Start the application. Fails if a previous one is still alive.
    ///
    /// A previous handle whose process already exited on its own is reaped
    /// and replaced.
    pub fn start(&mut self, spec: &CommandSpec) -> Result<Option<u32>> {
        if let Some(existing) = self.current.as_mut() {
            if !existing.has_exited()? {
                return Err(RunSourceError::ProcessAlreadyRunning {
                    pid: existing.pid().unwrap_or_default(),
                });
            }
            warn!(
                pid = ?existing.pid(),
                "replacing handle of an application that exited on its own"
            );
        }

        let process = ManagedProcess::spawn(spec, self.output_mode)?;
        let pid = process.pid();
        self.current = Some(process);
        Ok(pid)
    }

    /// Terminate the held process, if any. No-op when nothing is held.
    ///
    /// The handle stays held until the child has exited. If this future is
    /// dropped half way, the next call resumes the graceful stop instead of
    /// the child being killed with the handle.
    pub async fn terminate(&mut self) -> Result<()> {
        let Some(process) = self.current.as_mut() else {
            return Ok(());
        };

        let code = process.terminate(self.terminate_poll).await?;
        info!(
            pid = ?process.pid(),
            exit_code = code,
            signals_sent = process.signals_sent(),
            "application process stopped"
        );
        self.current = None;
        Ok(())
    }

    /// True while a handle is held and its process has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.current.as_mut() {
            Some(process) => matches!(process.has_exited(), Ok(false)),
            None => false,
        }
    }

    /// True while a handle is held, whether or not the process still runs.
    pub fn has_handle(&self) -> bool {
        self.current.is_some()
    }
}
