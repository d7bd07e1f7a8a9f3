// src/engine/backend.rs

//! Pluggable deployment backend.
//!
//! The runtime talks to a `DeployBackend` instead of calling git, the build
//! toolchain and the process supervisor directly. This makes it easy to swap
//! in a scripted fake in tests while keeping the production wiring in
//! [`RealDeployBackend`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::build::{find_entry_point, ArtifactLayout, Publisher};
use crate::config::Settings;
use crate::errors::Result;
use crate::exec::{CommandSpec, ProcessSupervisor};
use crate::fs::FileSystem;
use crate::source::GitClient;
use crate::types::{CommitRef, DeploymentTarget};
use crate::workspace::{recreate_dir, remove_tree, WorkspaceLayout};

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// The side effects the deployment loop needs, one method per state.
pub trait DeployBackend: Send {
    /// Initialise the local clone and register the remote.
    fn prepare(&mut self) -> BackendFuture<'_, ()>;

    /// Resolve the target branch on the remote.
    fn resolve_commit(&mut self) -> BackendFuture<'_, CommitRef>;

    /// Fetch `commit` into the clone and check it out.
    fn fetch_commit(&mut self, commit: CommitRef) -> BackendFuture<'_, ()>;

    /// Publish into a fresh output directory and return the entry point.
    fn publish(&mut self) -> BackendFuture<'_, PathBuf>;

    /// Start the application from `entry_point`.
    fn launch(&mut self, entry_point: PathBuf) -> BackendFuture<'_, ()>;

    /// Gracefully stop the application. No-op if none is running.
    fn stop_application(&mut self) -> BackendFuture<'_, ()>;

    /// Remove the publish output, keeping the clone.
    fn clear_published(&mut self) -> BackendFuture<'_, ()>;

    /// Non-blocking: is the launched application still alive?
    fn application_running(&mut self) -> bool;
}

/// Production backend: real `git`, real build toolchain, real processes.
///
/// Field order matters: the supervisor is dropped first, so a still-running
/// application is killed before anything else goes away.
#[derive(Debug)]
pub struct RealDeployBackend {
    supervisor: ProcessSupervisor,
    target: DeploymentTarget,
    git: GitClient,
    publisher: Publisher,
    launcher: String,
    remote: String,
    artifact_layout: ArtifactLayout,
    layout: WorkspaceLayout,
    fs: Arc<dyn FileSystem>,
}

impl RealDeployBackend {
    pub fn new(
        target: DeploymentTarget,
        settings: &Settings,
        layout: WorkspaceLayout,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(
                settings.output_mode,
                settings.terminate_poll_interval,
            ),
            target,
            git: GitClient::new(&settings.toolchain.git),
            publisher: Publisher::new(&settings.toolchain.build, &settings.toolchain.configuration),
            launcher: settings.toolchain.launcher.clone(),
            remote: settings.remote.clone(),
            artifact_layout: settings.artifact_layout(),
            layout,
            fs,
        }
    }

    fn project_dir(&self) -> PathBuf {
        project_dir(&self.layout.repo_dir, &self.target.project_path)
    }
}

fn project_dir(repo_dir: &Path, project_path: &Path) -> PathBuf {
    if project_path.as_os_str().is_empty() {
        repo_dir.to_path_buf()
    } else {
        repo_dir.join(project_path)
    }
}

impl DeployBackend for RealDeployBackend {
    fn prepare(&mut self) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.fs.create_dir_all(&self.layout.repo_dir)?;
            self.git.init(&self.layout.repo_dir).await?;
            self.git
                .add_remote(&self.layout.repo_dir, &self.remote, &self.target.repository_url)
                .await
        })
    }

    fn resolve_commit(&mut self) -> BackendFuture<'_, CommitRef> {
        Box::pin(async move {
            self.git
                .resolve_commit(&self.target.repository_url, &self.target.branch)
                .await
        })
    }

    fn fetch_commit(&mut self, commit: CommitRef) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            self.git
                .fetch(&self.layout.repo_dir, &self.remote, &commit)
                .await?;
            self.git.checkout(&self.layout.repo_dir, &commit).await
        })
    }

    fn publish(&mut self) -> BackendFuture<'_, PathBuf> {
        Box::pin(async move {
            let output_dir = self.layout.published_dir.clone();
            recreate_dir(self.fs.as_ref(), &output_dir)?;

            self.publisher.publish(&self.project_dir(), &output_dir).await?;

            let entry_point =
                find_entry_point(self.fs.as_ref(), &output_dir, &self.artifact_layout)?;
            debug!(?entry_point, "located entry point");
            Ok(entry_point)
        })
    }

    fn launch(&mut self, entry_point: PathBuf) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let spec = CommandSpec::new(&self.launcher).path_arg(&entry_point);
            self.supervisor.start(&spec)?;
            Ok(())
        })
    }

    fn stop_application(&mut self) -> BackendFuture<'_, ()> {
        Box::pin(async move { self.supervisor.terminate().await })
    }

    fn clear_published(&mut self) -> BackendFuture<'_, ()> {
        Box::pin(async move { remove_tree(self.fs.as_ref(), &self.layout.published_dir) })
    }

    fn application_running(&mut self) -> bool {
        self.supervisor.is_running()
    }
}
