// src/config/validate.rs

use crate::config::duration::parse_duration;
use crate::config::model::{RawSettingsFile, RetryPolicy, Settings, ToolchainSection};
use crate::errors::{Result, RunSourceError};
use crate::exec::OutputMode;

impl TryFrom<RawSettingsFile> for Settings {
    type Error = crate::errors::RunSourceError;

    fn try_from(raw: RawSettingsFile) -> std::result::Result<Self, Self::Error> {
        validate_toolchain(&raw.toolchain)?;

        let deploy = raw.deploy;
        if deploy.remote.trim().is_empty() {
            return Err(RunSourceError::ConfigError(
                "[deploy].remote must not be empty".to_string(),
            ));
        }

        let poll_interval = parse_field("[deploy].poll_interval", &deploy.poll_interval)?;
        let terminate_poll_interval = parse_field(
            "[deploy].terminate_poll_interval",
            &deploy.terminate_poll_interval,
        )?;
        let retry_backoff = parse_field("[deploy].retry_backoff", &deploy.retry_backoff)?;

        let output_mode = if deploy.capture_app_output {
            OutputMode::Capture
        } else {
            OutputMode::Inherit
        };

        Ok(Settings {
            toolchain: raw.toolchain,
            remote: deploy.remote,
            poll_interval,
            terminate_poll_interval,
            temp_root: deploy.temp_root.unwrap_or_else(std::env::temp_dir),
            retry: RetryPolicy {
                max_retries: deploy.max_retries,
                base_delay: retry_backoff,
            },
            watch_child_liveness: deploy.watch_child_liveness,
            output_mode,
        })
    }
}

fn parse_field(name: &str, value: &str) -> Result<std::time::Duration> {
    parse_duration(value).map_err(|e| RunSourceError::ConfigError(format!("{name}: {e}")))
}

fn validate_toolchain(toolchain: &ToolchainSection) -> Result<()> {
    let programs = [
        ("git", &toolchain.git),
        ("build", &toolchain.build),
        ("launcher", &toolchain.launcher),
        ("configuration", &toolchain.configuration),
    ];
    for (key, value) in programs {
        if value.trim().is_empty() {
            return Err(RunSourceError::ConfigError(format!(
                "[toolchain].{key} must not be empty"
            )));
        }
    }

    let suffixes = [
        ("descriptor_suffix", &toolchain.descriptor_suffix),
        ("artifact_extension", &toolchain.artifact_extension),
    ];
    for (key, value) in suffixes {
        if !value.starts_with('.') || value.len() < 2 {
            return Err(RunSourceError::ConfigError(format!(
                "[toolchain].{key} must start with '.' (got {value:?})"
            )));
        }
    }

    Ok(())
}
