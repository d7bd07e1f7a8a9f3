// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::build::ArtifactLayout;
use crate::exec::OutputMode;

/// Top-level settings file as read from TOML.
///
/// ```toml
/// [toolchain]
/// git = "git"
/// build = "dotnet"
/// launcher = "dotnet"
///
/// [deploy]
/// poll_interval = "1m"
/// max_retries = 2
/// ```
///
/// All sections and keys are optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSettingsFile {
    #[serde(default)]
    pub toolchain: ToolchainSection,

    #[serde(default)]
    pub deploy: DeploySection,
}

/// `[toolchain]`: which external programs to run and how artifacts are named.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSection {
    /// Version-control client.
    pub git: String,
    /// Build toolchain, invoked as `<build> publish ...`.
    pub build: String,
    /// Runtime launcher, invoked as `<launcher> <entry point>`.
    pub launcher: String,
    /// Build configuration passed as `-c`.
    pub configuration: String,
    pub descriptor_suffix: String,
    pub artifact_extension: String,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        let layout = ArtifactLayout::default();
        Self {
            git: "git".to_string(),
            build: "dotnet".to_string(),
            launcher: "dotnet".to_string(),
            configuration: "Release".to_string(),
            descriptor_suffix: layout.descriptor_suffix,
            artifact_extension: layout.artifact_extension,
        }
    }
}

/// `[deploy]`: loop behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeploySection {
    /// Name under which the source repository is registered in the clone.
    pub remote: String,
    pub poll_interval: String,
    /// How long to wait for the application to exit before re-sending
    /// the termination signal.
    pub terminate_poll_interval: String,
    /// Parent of the per-run workspace; defaults to the OS temp dir.
    pub temp_root: Option<PathBuf>,
    /// Consecutive step failures tolerated before the run ends.
    pub max_retries: u32,
    /// Base delay between retries; doubles on each consecutive failure.
    pub retry_backoff: String,
    /// Warn when the application exits on its own while watching.
    pub watch_child_liveness: bool,
    /// Pipe the application's output through the log instead of sharing
    /// the terminal.
    pub capture_app_output: bool,
}

pub const DEFAULT_POLL_INTERVAL: &str = "5m";

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL.to_string(),
            terminate_poll_interval: "500ms".to_string(),
            temp_root: None,
            max_retries: 0,
            retry_backoff: "10s".to_string(),
            watch_child_liveness: false,
            capture_app_output: false,
        }
    }
}

/// Validated settings with durations parsed.
///
/// Only constructible through `TryFrom<RawSettingsFile>` (see
/// `config::validate`), so holders can rely on every field being usable.
#[derive(Debug, Clone)]
pub struct Settings {
    pub toolchain: ToolchainSection,
    pub remote: String,
    pub poll_interval: Duration,
    pub terminate_poll_interval: Duration,
    pub temp_root: PathBuf,
    pub retry: RetryPolicy,
    pub watch_child_liveness: bool,
    pub output_mode: OutputMode,
}

impl Settings {
    pub fn artifact_layout(&self) -> ArtifactLayout {
        ArtifactLayout {
            descriptor_suffix: self.toolchain.descriptor_suffix.clone(),
            artifact_extension: self.toolchain.artifact_extension.clone(),
        }
    }
}

/// How many consecutive failures to tolerate, and how long to wait
/// between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Fatal on first failure.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}
