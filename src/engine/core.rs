// src/engine/core.rs

//! Pure core state machine of the deployment loop.
//!
//! [`DeployCore`] consumes [`DeployEvent`]s and produces the next
//! [`CoreCommand`]. It has no channels, no Tokio types and performs no IO, so
//! every transition can be tested by feeding events by hand.
//!
//! Invariants kept here:
//! - `Launch` is only ever issued when no application is live.
//! - `FetchCommit` after a change always carries the newly observed commit.
//! - every path out of the loop goes through `Cleanup`.

use crate::config::RetryPolicy;
use crate::engine::{CoreCommand, CoreStep, DeployEvent, Phase};
use crate::types::CommitRef;

#[derive(Debug)]
pub struct DeployCore {
    phase: Phase,
    current: Option<CommitRef>,
    process_live: bool,
    retry: RetryPolicy,
    consecutive_failures: u32,
    /// Phase to return to once a backoff elapses.
    resume: Phase,
    cycles: u64,
}

impl DeployCore {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            phase: Phase::Idle,
            current: None,
            process_live: false,
            retry,
            consecutive_failures: 0,
            resume: Phase::Resolve,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The commit the loop is currently building or running.
    pub fn current_commit(&self) -> Option<&CommitRef> {
        self.current.as_ref()
    }

    /// Whether an application process has been launched and not yet
    /// terminated.
    pub fn process_live(&self) -> bool {
        self.process_live
    }

    /// Number of successful launches.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Handle a single event and return what the shell should do next.
    pub fn step(&mut self, event: DeployEvent) -> CoreStep {
        match (self.phase, event) {
            (Phase::Exited, _) => CoreStep::stop(),

            (Phase::Cleanup, DeployEvent::CleanedUp | DeployEvent::StepFailed) => {
                self.phase = Phase::Exited;
                self.process_live = false;
                CoreStep::stop()
            }
            // Already on the way out.
            (Phase::Cleanup, _) => CoreStep::next(CoreCommand::Cleanup),

            (_, DeployEvent::ShutdownRequested) => self.enter_cleanup(),
            (_, DeployEvent::StepFailed) => self.handle_failure(),

            (Phase::Idle, DeployEvent::Started) => {
                self.phase = Phase::Prepare;
                CoreStep::next(CoreCommand::PrepareRepository)
            }

            (Phase::Prepare, DeployEvent::Prepared) => {
                self.phase = Phase::Resolve;
                CoreStep::next(CoreCommand::ResolveCommit)
            }

            (Phase::Resolve, DeployEvent::Resolved(commit)) => {
                self.current = Some(commit.clone());
                self.phase = Phase::Fetch;
                CoreStep::next(CoreCommand::FetchCommit(commit))
            }

            (Phase::Fetch, DeployEvent::Fetched) => {
                self.phase = Phase::Build;
                CoreStep::next(CoreCommand::Publish)
            }

            (Phase::Build, DeployEvent::Published { entry_point }) => {
                if self.process_live {
                    // A second application would break the single-process
                    // invariant; treat as unrecoverable.
                    return self.enter_cleanup();
                }
                self.phase = Phase::Run;
                CoreStep::next(CoreCommand::Launch(entry_point))
            }

            (Phase::Run, DeployEvent::Launched) => {
                self.process_live = true;
                self.consecutive_failures = 0;
                self.cycles += 1;
                self.phase = Phase::Watch;
                CoreStep::next(CoreCommand::PollRemote)
            }

            (Phase::Watch, DeployEvent::Polled(latest)) => {
                if self.current.as_ref() == Some(&latest) {
                    return CoreStep::next(CoreCommand::PollRemote);
                }
                self.current = Some(latest.clone());
                self.phase = Phase::Terminate;
                CoreStep::next(CoreCommand::Terminate { next: latest })
            }

            (Phase::Terminate, DeployEvent::Terminated) => {
                self.process_live = false;
                self.phase = Phase::Fetch;
                match self.current.clone() {
                    Some(commit) => CoreStep::next(CoreCommand::FetchCommit(commit)),
                    None => self.enter_cleanup(),
                }
            }

            (Phase::Backoff, DeployEvent::BackedOff) => {
                if self.resume == Phase::Watch && self.process_live {
                    self.phase = Phase::Watch;
                    CoreStep::next(CoreCommand::PollRemote)
                } else {
                    self.phase = Phase::Resolve;
                    CoreStep::next(CoreCommand::ResolveCommit)
                }
            }

            // Any other pairing means the shell and the core disagree about
            // where we are; stop rather than guess.
            (_, _) => self.enter_cleanup(),
        }
    }

    fn handle_failure(&mut self) -> CoreStep {
        let retryable = matches!(
            self.phase,
            Phase::Resolve | Phase::Fetch | Phase::Build | Phase::Run | Phase::Watch
        );
        if !retryable || self.consecutive_failures >= self.retry.max_retries {
            return self.enter_cleanup();
        }

        self.consecutive_failures += 1;
        self.resume = if self.phase == Phase::Watch {
            Phase::Watch
        } else {
            Phase::Resolve
        };
        self.phase = Phase::Backoff;
        CoreStep::next(CoreCommand::Backoff(
            self.retry.delay_for(self.consecutive_failures),
        ))
    }

    fn enter_cleanup(&mut self) -> CoreStep {
        self.phase = Phase::Cleanup;
        CoreStep::next(CoreCommand::Cleanup)
    }
}
