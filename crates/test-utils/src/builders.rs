#![allow(dead_code)]

use std::path::Path;

use runsource::config::{DeploySection, RawSettingsFile, Settings, ToolchainSection};

/// Builder for `Settings` to simplify test setup.
///
/// Starts from the built-in defaults but with a short poll interval and
/// terminate poll, so loops in tests turn over quickly.
pub struct SettingsBuilder {
    raw: RawSettingsFile,
}

impl SettingsBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawSettingsFile {
                toolchain: ToolchainSection::default(),
                deploy: DeploySection {
                    poll_interval: "20ms".to_string(),
                    terminate_poll_interval: "50ms".to_string(),
                    retry_backoff: "1ms".to_string(),
                    ..DeploySection::default()
                },
            },
        }
    }

    pub fn poll_interval(mut self, value: &str) -> Self {
        self.raw.deploy.poll_interval = value.to_string();
        self
    }

    pub fn max_retries(mut self, value: u32) -> Self {
        self.raw.deploy.max_retries = value;
        self
    }

    pub fn retry_backoff(mut self, value: &str) -> Self {
        self.raw.deploy.retry_backoff = value.to_string();
        self
    }

    pub fn watch_child_liveness(mut self, value: bool) -> Self {
        self.raw.deploy.watch_child_liveness = value;
        self
    }

    pub fn temp_root(mut self, dir: &Path) -> Self {
        self.raw.deploy.temp_root = Some(dir.to_path_buf());
        self
    }

    pub fn git(mut self, program: &Path) -> Self {
        self.raw.toolchain.git = program.to_string_lossy().into_owned();
        self
    }

    pub fn build_program(mut self, program: &Path) -> Self {
        self.raw.toolchain.build = program.to_string_lossy().into_owned();
        self
    }

    pub fn launcher(mut self, program: &Path) -> Self {
        self.raw.toolchain.launcher = program.to_string_lossy().into_owned();
        self
    }

    pub fn raw(self) -> RawSettingsFile {
        self.raw
    }

    pub fn build(self) -> Settings {
        Settings::try_from(self.raw).expect("Failed to build valid settings from builder")
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
