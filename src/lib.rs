// src/lib.rs

pub mod build;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod source;
pub mod types;
pub mod workspace;

use std::path::{Component, Path};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{load_settings, parse_duration, Settings};
use crate::engine::{DeployBackend, DeployCore, RealDeployBackend, RunReport, Runtime, RuntimeOptions};
use crate::errors::{Result, RunSourceError};
use crate::fs::{FileSystem, RealFileSystem};
use crate::types::DeploymentTarget;
use crate::workspace::Workspace;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (file + CLI overrides)
/// - the deployment target
/// - Ctrl-C / SIGTERM handling
/// - the workspace, the real backend and the runtime
pub async fn run(args: CliArgs) -> Result<RunReport> {
    let mut settings = load_settings(&RealFileSystem, args.config.as_deref())?;
    if let Some(ref interval) = args.poll_interval {
        settings.poll_interval = parse_duration(interval)?;
    }

    let target = target_from_args(&args)?;
    let shutdown_rx = spawn_signal_listener();

    deploy(target, settings, Some(shutdown_rx)).await
}

/// Build the deployment target from CLI arguments.
///
/// The project path must stay inside the clone: absolute paths and `..`
/// components are rejected.
pub fn target_from_args(args: &CliArgs) -> Result<DeploymentTarget> {
    if args.repo.trim().is_empty() {
        return Err(RunSourceError::ConfigError(
            "repository url must not be empty".to_string(),
        ));
    }
    if let Some(ref project) = args.project {
        validate_project_path(project)?;
    }
    Ok(DeploymentTarget::new(
        args.repo.clone(),
        args.branch.clone(),
        args.project.clone(),
    ))
}

fn validate_project_path(project: &Path) -> Result<()> {
    let escapes = project.components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if escapes {
        return Err(RunSourceError::ConfigError(format!(
            "--project must be a relative path inside the repository (got {:?})",
            project
        )));
    }
    Ok(())
}

/// Run the deployment loop for `target` with real git / build / processes.
///
/// The workspace is created here and removed when the loop ends, after the
/// application has been stopped. On unwinding, dropping the backend kills
/// any remaining child before the workspace's own `Drop` removes the tree.
pub async fn deploy(
    target: DeploymentTarget,
    settings: Settings,
    shutdown_rx: Option<mpsc::Receiver<()>>,
) -> Result<RunReport> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let workspace = Workspace::create(Arc::clone(&fs), &settings.temp_root)?;

    info!(
        repo = %target.repository_url,
        branch = %target.branch,
        project = ?target.project_path,
        poll_interval = ?settings.poll_interval,
        "starting deployment"
    );

    let backend = RealDeployBackend::new(target, &settings, workspace.layout().clone(), fs);
    let report = run_with_backend(backend, &settings, shutdown_rx).await;

    workspace.close()?;
    Ok(report)
}

/// Run the deployment loop against any backend.
pub async fn run_with_backend<B: DeployBackend>(
    backend: B,
    settings: &Settings,
    shutdown_rx: Option<mpsc::Receiver<()>>,
) -> RunReport {
    let core = DeployCore::new(settings.retry);
    let options = RuntimeOptions {
        poll_interval: settings.poll_interval,
        watch_child_liveness: settings.watch_child_liveness,
    };
    Runtime::new(core, backend, options, shutdown_rx).run().await
}

/// Status the supervisor process exits with. There is no success path: a run
/// only ends on failure or interrupt.
pub const EXIT_STATUS: i32 = -1;

/// What to do about the `received`-th interrupt (1-based) of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Stop the application and remove the workspace.
    Shutdown,
    /// Cleanup is still running; leave without waiting for it.
    ForceExit,
}

pub fn interrupt_action(received: u32) -> InterruptAction {
    if received <= 1 {
        InterruptAction::Shutdown
    } else {
        InterruptAction::ForceExit
    }
}

/// Ctrl-C (and SIGTERM on Unix) → one message on the returned channel.
///
/// A second interrupt exits the process at once, leaving the application and
/// the workspace behind.
fn spawn_signal_listener() -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let mut received = 0u32;
        loop {
            wait_for_signal().await;
            received += 1;
            match interrupt_action(received) {
                InterruptAction::Shutdown => {
                    let _ = tx.try_send(());
                }
                InterruptAction::ForceExit => {
                    warn!("interrupted again; exiting without cleanup");
                    std::process::exit(EXIT_STATUS);
                }
            }
        }
    });

    rx
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to listen for SIGTERM");
            return ctrl_c_or_pending().await;
        }
    };

    tokio::select! {
        _ = ctrl_c_or_pending() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c_or_pending().await
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c_or_pending() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
