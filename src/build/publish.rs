// src/build/publish.rs

use std::path::Path;

use tracing::debug;

use crate::errors::{Result, RunSourceError};
use crate::exec::command::{self, CommandSpec};

/// Invokes the project's build toolchain in publish mode.
#[derive(Debug, Clone)]
pub struct Publisher {
    program: String,
    configuration: String,
}

impl Publisher {
    pub fn new(program: impl Into<String>, configuration: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            configuration: configuration.into(),
        }
    }

    /// The exact invocation used for `publish`.
    pub fn command(&self, project_dir: &Path, output_dir: &Path) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg("publish")
            .path_arg(project_dir)
            .arg("-c")
            .arg(&self.configuration)
            .arg("-o")
            .path_arg(output_dir)
    }

    /// `<program> publish <project_dir> -c <configuration> -o <output_dir>`
    ///
    /// A non-zero exit becomes `BuildFailed`, carrying the toolchain's
    /// interleaved output.
    pub async fn publish(&self, project_dir: &Path, output_dir: &Path) -> Result<()> {
        let spec = self.command(project_dir, output_dir);
        match command::run(&spec).await {
            Ok(output) => {
                debug!(lines = output.lines().len(), "publish succeeded");
                Ok(())
            }
            Err(RunSourceError::CommandFailed(failure)) => Err(RunSourceError::BuildFailed(failure)),
            Err(e) => Err(e),
        }
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new("dotnet", "Release")
    }
}
