// src/engine/mod.rs

//! Deployment loop.
//!
//! The loop drives one deployment target through
//! `PREPARE → RESOLVE → FETCH → BUILD → RUN → WATCH → TERMINATE → FETCH ...`
//! until a failure (beyond the retry budget) or an interrupt sends it to
//! `CLEANUP`.
//!
//! The pure state machine lives in [`core`]; the async/IO shell that talks to
//! git, the build toolchain and the application process is implemented in
//! [`runtime`], against the [`backend::DeployBackend`] trait.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::CommitRef;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started yet.
    Idle,
    Prepare,
    Resolve,
    Fetch,
    Build,
    Run,
    Watch,
    Terminate,
    /// Waiting before a retry.
    Backoff,
    Cleanup,
    Exited,
}

/// Results fed back into the core by the runtime shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployEvent {
    Started,
    Prepared,
    Resolved(CommitRef),
    Fetched,
    Published { entry_point: PathBuf },
    Launched,
    /// The branch was resolved again while watching.
    Polled(CommitRef),
    Terminated,
    BackedOff,
    /// The command for the current phase failed. The runtime has already
    /// logged the error.
    StepFailed,
    /// SIGINT / SIGTERM reached the supervisor.
    ShutdownRequested,
    CleanedUp,
}

/// What the core wants the shell to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Initialise the persistent clone and register the remote.
    PrepareRepository,
    ResolveCommit,
    /// Fetch this exact commit and check it out.
    FetchCommit(CommitRef),
    Publish,
    Launch(PathBuf),
    /// Sleep for the poll interval, then resolve the branch.
    PollRemote,
    /// Stop the application and discard the publish output; `next` is the
    /// commit that triggered the stop.
    Terminate { next: CommitRef },
    Backoff(Duration),
    /// Stop the application, if any, before the workspace goes away.
    Cleanup,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub command: Option<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn next(command: CoreCommand) -> Self {
        Self {
            command: Some(command),
            keep_running: true,
        }
    }

    fn stop() -> Self {
        Self {
            command: None,
            keep_running: false,
        }
    }
}

/// Options for the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub poll_interval: Duration,
    /// Check, on every poll, whether the application is still alive and warn
    /// once if it is not.
    pub watch_child_liveness: bool,
}

pub mod backend;
pub mod core;
pub mod runtime;

pub use backend::{BackendFuture, DeployBackend, RealDeployBackend};
pub use core::DeployCore;
pub use runtime::{RunReport, Runtime};
