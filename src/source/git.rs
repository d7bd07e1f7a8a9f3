// src/source/git.rs

use std::path::Path;

use tracing::debug;

use crate::errors::{CommandFailed, Result, RunSourceError};
use crate::exec::command::{self, CommandSpec};
use crate::types::CommitRef;

/// Thin wrapper over the `git` command line.
///
/// Every operation is a single subprocess; failures carry the captured
/// output of that subprocess.
#[derive(Debug, Clone)]
pub struct GitClient {
    program: String,
}

impl GitClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
    }

    /// Resolve `reference` on the remote at `url` to a commit id.
    ///
    /// Runs `git ls-remote <url> <reference>` and takes the id from the
    /// first output line. A non-zero exit is `RemoteUnavailable`; a clean
    /// exit with nothing to parse is `RefNotFound`.
    pub async fn resolve_commit(&self, url: &str, reference: &str) -> Result<CommitRef> {
        let spec = self.command().arg("ls-remote").arg(url).arg(reference);
        let (exit_code, output) = command::run_unchecked(&spec).await?;

        if exit_code != 0 {
            return Err(RunSourceError::RemoteUnavailable {
                url: url.to_string(),
                reference: reference.to_string(),
                failure: CommandFailed {
                    command_line: spec.command_line(),
                    exit_code,
                    output,
                },
            });
        }

        let commit = CommitRef::from_ls_remote(&output.stdout_text()).ok_or_else(|| {
            RunSourceError::RefNotFound {
                url: url.to_string(),
                reference: reference.to_string(),
            }
        })?;

        debug!(%url, %reference, %commit, "resolved remote ref");
        Ok(commit)
    }

    /// `git init <directory>`
    pub async fn init(&self, directory: &Path) -> Result<()> {
        command::run(&self.command().arg("init").path_arg(directory)).await?;
        Ok(())
    }

    /// `git remote add <name> <url>`, inside `directory`.
    pub async fn add_remote(&self, directory: &Path, name: &str, url: &str) -> Result<()> {
        let spec = self
            .command()
            .arg("remote")
            .arg("add")
            .arg(name)
            .arg(url)
            .current_dir(directory);
        command::run(&spec).await?;
        Ok(())
    }

    /// `git fetch <remote> <commit>`, inside `directory`.
    ///
    /// Fetches by exact commit id, so only the objects needed for that commit
    /// are transferred and later branch movement does not matter.
    pub async fn fetch(&self, directory: &Path, remote: &str, commit: &CommitRef) -> Result<()> {
        let spec = self
            .command()
            .arg("fetch")
            .arg(remote)
            .arg(commit.as_str())
            .current_dir(directory);
        command::run(&spec).await?;
        Ok(())
    }

    /// `git checkout <commit>`, inside `directory`.
    ///
    /// Fails with `CommandFailed` if the commit is not present locally.
    pub async fn checkout(&self, directory: &Path, commit: &CommitRef) -> Result<()> {
        let spec = self
            .command()
            .arg("checkout")
            .arg(commit.as_str())
            .current_dir(directory);
        command::run(&spec).await?;
        Ok(())
    }
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("git")
    }
}
