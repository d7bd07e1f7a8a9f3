// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;

use super::backend::DeployBackend;
use super::core::DeployCore;
use super::{CoreCommand, DeployEvent, RuntimeOptions};

/// Summary of a finished run, for the caller and for tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Successful application launches.
    pub cycles: u64,
    /// The run ended because of an interrupt.
    pub interrupted: bool,
    /// Rendered form of the last step failure, if any.
    pub last_error: Option<String>,
}

/// Drives [`DeployCore`] and executes its commands against a
/// [`DeployBackend`].
///
/// Every command except `Cleanup` is raced against the shutdown channel, so
/// an interrupt reaches the cleanup path from any suspension point.
pub struct Runtime<B: DeployBackend> {
    core: DeployCore,
    shell: Shell<B>,
    shutdown_rx: Option<mpsc::Receiver<()>>,
}

impl<B: DeployBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

/// IO half of the runtime, split out so it can be borrowed independently of
/// the shutdown receiver.
struct Shell<B: DeployBackend> {
    backend: B,
    options: RuntimeOptions,
    /// Set once the application has been reported as exited for the current
    /// launch.
    exit_reported: bool,
    last_error: Option<String>,
    interrupted: bool,
}

impl<B: DeployBackend> Runtime<B> {
    pub fn new(
        core: DeployCore,
        backend: B,
        options: RuntimeOptions,
        shutdown_rx: Option<mpsc::Receiver<()>>,
    ) -> Self {
        Self {
            core,
            shell: Shell {
                backend,
                options,
                exit_reported: false,
                last_error: None,
                interrupted: false,
            },
            shutdown_rx,
        }
    }

    /// Main loop. Returns once the core reaches its terminal state.
    ///
    /// Step failures are not returned as errors: they are logged, handed to
    /// the core, and summarised in the [`RunReport`].
    pub async fn run(mut self) -> RunReport {
        info!("runsource runtime started");

        let mut step = self.core.step(DeployEvent::Started);

        while step.keep_running {
            let Some(command) = step.command.take() else {
                break;
            };
            debug!(phase = ?self.core.phase(), ?command, "executing command");

            let event = self.execute_or_interrupt(command).await;
            debug!(?event, "runtime received event");
            if event == DeployEvent::ShutdownRequested {
                self.shell.interrupted = true;
            }

            step = self.core.step(event);
        }

        info!(cycles = self.core.cycles(), "runtime exiting");
        RunReport {
            cycles: self.core.cycles(),
            interrupted: self.shell.interrupted,
            last_error: self.shell.last_error,
        }
    }

    async fn execute_or_interrupt(&mut self, command: CoreCommand) -> DeployEvent {
        let cleanup = matches!(command, CoreCommand::Cleanup);
        let rx = match self.shutdown_rx.as_mut() {
            Some(rx) if !cleanup => rx,
            _ => return self.shell.execute(command).await,
        };

        tokio::select! {
            event = self.shell.execute(command) => event,
            Some(()) = rx.recv() => {
                info!("interrupt received; shutting down");
                DeployEvent::ShutdownRequested
            }
        }
    }
}

impl<B: DeployBackend> Shell<B> {
    async fn execute(&mut self, command: CoreCommand) -> DeployEvent {
        let result = match command {
            CoreCommand::PrepareRepository => {
                info!("preparing local repository");
                self.backend.prepare().await.map(|()| DeployEvent::Prepared)
            }
            CoreCommand::ResolveCommit => {
                info!("checking repository for latest commit");
                self.backend.resolve_commit().await.map(DeployEvent::Resolved)
            }
            CoreCommand::FetchCommit(commit) => {
                info!(%commit, "fetching {commit}");
                self.backend
                    .fetch_commit(commit)
                    .await
                    .map(|()| DeployEvent::Fetched)
            }
            CoreCommand::Publish => {
                info!("publishing application");
                self.backend
                    .publish()
                    .await
                    .map(|entry_point| DeployEvent::Published { entry_point })
            }
            CoreCommand::Launch(entry_point) => {
                info!(?entry_point, "running application");
                self.exit_reported = false;
                self.backend
                    .launch(entry_point)
                    .await
                    .map(|()| DeployEvent::Launched)
            }
            CoreCommand::PollRemote => self.poll_remote().await.map(DeployEvent::Polled),
            CoreCommand::Terminate { next } => {
                info!(commit = %next, "the repository has changed");
                info!("terminating application");
                self.terminate().await.map(|()| DeployEvent::Terminated)
            }
            CoreCommand::Backoff(delay) => {
                warn!(?delay, "retrying after failure");
                tokio::time::sleep(delay).await;
                Ok(DeployEvent::BackedOff)
            }
            CoreCommand::Cleanup => {
                info!("stopping application before cleanup");
                self.backend
                    .stop_application()
                    .await
                    .map(|()| DeployEvent::CleanedUp)
            }
        };

        match result {
            Ok(event) => event,
            Err(err) => {
                let rendered = err.to_string();
                error!("{rendered}");
                self.last_error = Some(rendered);
                DeployEvent::StepFailed
            }
        }
    }

    async fn poll_remote(&mut self) -> Result<crate::types::CommitRef> {
        tokio::time::sleep(self.options.poll_interval).await;

        if self.options.watch_child_liveness
            && !self.exit_reported
            && !self.backend.application_running()
        {
            warn!("application is no longer running; still watching for changes");
            self.exit_reported = true;
        }

        self.backend.resolve_commit().await
    }

    async fn terminate(&mut self) -> Result<()> {
        self.backend.stop_application().await?;
        self.backend.clear_published().await
    }
}
