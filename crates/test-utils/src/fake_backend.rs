use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use runsource::engine::{BackendFuture, DeployBackend};
use runsource::errors::{CommandFailed, RunSourceError};
use runsource::exec::{CapturedOutput, OutputLine};
use runsource::types::CommitRef;

/// What the fake remote answers to one `resolve_commit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remote {
    Commit(String),
    Unavailable,
}

/// Every backend call, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Prepare,
    Resolve,
    Fetch(String),
    Publish(String),
    Launch(PathBuf),
    Stop,
    ClearPublished,
}

#[derive(Debug, Default)]
struct State {
    remote: VecDeque<Remote>,
    checked_out: Option<String>,
    fail_fetch: HashSet<String>,
    fail_publish: HashSet<String>,
    calls: Vec<Call>,
    live: usize,
    max_live: usize,
    /// Launched applications that "crash" right away.
    crash_on_launch: bool,
    /// How long a stop takes before the application is gone.
    stop_delay: Option<Duration>,
}

/// A scripted backend that:
/// - answers `resolve_commit` from a queue (the last answer repeats)
/// - records every call
/// - tracks how many fake application processes are live
///
/// Clones share state, so a test can keep one clone as a probe after moving
/// the other into the runtime.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
}

impl FakeBackend {
    pub fn new(remote: Vec<Remote>) -> Self {
        let backend = Self::default();
        backend.lock().remote = remote.into();
        backend
    }

    /// Shorthand for a remote that only ever answers with commits.
    pub fn with_commits(commits: &[&str]) -> Self {
        Self::new(commits.iter().map(|c| Remote::Commit(c.to_string())).collect())
    }

    pub fn fail_fetch(self, commit: &str) -> Self {
        self.lock().fail_fetch.insert(commit.to_string());
        self
    }

    pub fn fail_publish(self, commit: &str) -> Self {
        self.lock().fail_publish.insert(commit.to_string());
        self
    }

    pub fn crash_on_launch(self) -> Self {
        self.lock().crash_on_launch = true;
        self
    }

    /// Applications take `delay` to exit after being asked to stop. A stop
    /// abandoned before then leaves the application live.
    pub fn slow_stop(self, delay: Duration) -> Self {
        self.lock().stop_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Commits in the order they were launched.
    pub fn launched(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Launch(path) => path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Fetch(commit) => Some(commit.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn live(&self) -> usize {
        self.lock().live
    }

    /// Highest number of simultaneously live applications observed.
    pub fn max_live(&self) -> usize {
        self.lock().max_live
    }
}

fn failure(command_line: &str, message: &str) -> CommandFailed {
    let mut output = CapturedOutput::default();
    output.push(OutputLine::Stderr(message.to_string()));
    CommandFailed {
        command_line: command_line.to_string(),
        exit_code: 1,
        output,
    }
}

impl DeployBackend for FakeBackend {
    fn prepare(&mut self) -> BackendFuture<'_, ()> {
        self.lock().calls.push(Call::Prepare);
        Box::pin(async { Ok(()) })
    }

    fn resolve_commit(&mut self) -> BackendFuture<'_, CommitRef> {
        let answer = {
            let mut state = self.lock();
            state.calls.push(Call::Resolve);
            if state.remote.len() > 1 {
                state.remote.pop_front()
            } else {
                state.remote.front().cloned()
            }
        };

        Box::pin(async move {
            match answer {
                Some(Remote::Commit(id)) => Ok(CommitRef::new(id)),
                _ => Err(RunSourceError::RemoteUnavailable {
                    url: "fake://repo".to_string(),
                    reference: "HEAD".to_string(),
                    failure: failure("git ls-remote fake://repo HEAD", "could not read from remote"),
                }),
            }
        })
    }

    fn fetch_commit(&mut self, commit: CommitRef) -> BackendFuture<'_, ()> {
        let result = {
            let mut state = self.lock();
            let id = commit.as_str().to_string();
            state.calls.push(Call::Fetch(id.clone()));
            if state.fail_fetch.contains(&id) {
                Err(RunSourceError::CommandFailed(failure(
                    &format!("git fetch origin {id}"),
                    "fatal: remote error",
                )))
            } else {
                state.checked_out = Some(id);
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn publish(&mut self) -> BackendFuture<'_, PathBuf> {
        let result = {
            let mut state = self.lock();
            let id = state.checked_out.clone().unwrap_or_default();
            state.calls.push(Call::Publish(id.clone()));
            if state.fail_publish.contains(&id) {
                Err(RunSourceError::BuildFailed(failure(
                    "dotnet publish",
                    "error CS1002: ; expected",
                )))
            } else {
                Ok(PathBuf::from("/fake/published").join(&id).join("app.dll"))
            }
        };
        Box::pin(async move { result })
    }

    fn launch(&mut self, entry_point: PathBuf) -> BackendFuture<'_, ()> {
        let result = {
            let mut state = self.lock();
            state.calls.push(Call::Launch(entry_point));
            if state.live > 0 {
                Err(RunSourceError::ProcessAlreadyRunning { pid: 1 })
            } else {
                if !state.crash_on_launch {
                    state.live += 1;
                }
                state.max_live = state.max_live.max(state.live + usize::from(state.crash_on_launch));
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn stop_application(&mut self) -> BackendFuture<'_, ()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(Call::Stop);
            state.stop_delay
        };
        let shared = Arc::clone(&self.state);
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            shared.lock().unwrap_or_else(|e| e.into_inner()).live = 0;
            Ok(())
        })
    }

    fn clear_published(&mut self) -> BackendFuture<'_, ()> {
        self.lock().calls.push(Call::ClearPublished);
        Box::pin(async { Ok(()) })
    }

    fn application_running(&mut self) -> bool {
        self.lock().live > 0
    }
}
