// src/errors.rs

//! Crate-wide error type and helpers.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::exec::CapturedOutput;

/// An external tool exited with a non-zero status.
///
/// The captured output is the only diagnostic we get from tools like `git`
/// or the build toolchain, so it is always part of the rendered message.
#[derive(Debug, Clone)]
pub struct CommandFailed {
    pub command_line: String,
    pub exit_code: i32,
    pub output: CapturedOutput,
}

impl fmt::Display for CommandFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "process '{}' failed with exit code {}",
            self.command_line, self.exit_code
        )?;
        writeln!(f, "process output:")?;
        write!(f, "{}", self.output)
    }
}

impl std::error::Error for CommandFailed {}

#[derive(Error, Debug)]
pub enum RunSourceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to start '{command_line}': {source}")]
    SpawnFailed {
        command_line: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    CommandFailed(#[from] CommandFailed),

    #[error("remote '{url}' is unavailable for ref '{reference}': {failure}")]
    RemoteUnavailable {
        url: String,
        reference: String,
        #[source]
        failure: CommandFailed,
    },

    #[error("ref '{reference}' not found on remote '{url}'")]
    RefNotFound { url: String, reference: String },

    #[error("build failed: {0}")]
    BuildFailed(#[source] CommandFailed),

    #[error("no '*{suffix}' descriptor found in {dir:?}")]
    ArtifactNotFound { dir: PathBuf, suffix: String },

    #[error("an application process is already running (pid {pid})")]
    ProcessAlreadyRunning { pid: u32 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, RunSourceError>;
