use std::fmt;
use std::path::PathBuf;

/// Identifier of one immutable snapshot of the source repository.
///
/// Opaque: two references are equal iff their identifiers are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitRef(String);

impl CommitRef {
    pub fn new(id: impl Into<String>) -> Self {
        CommitRef(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse `git ls-remote` output.
    ///
    /// Output lines look like `<commit-id>\t<ref>`. Only the first line is
    /// considered, and the identifier is the token before the first tab or
    /// whitespace. Returns `None` if there is no such token.
    pub fn from_ls_remote(output: &str) -> Option<CommitRef> {
        let first_line = output.lines().next()?;
        let id = first_line.split_whitespace().next()?;
        Some(CommitRef(id.to_string()))
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CommitRef {
    fn from(s: &str) -> Self {
        CommitRef(s.to_string())
    }
}

/// What to deploy: immutable for the life of one supervisor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentTarget {
    /// URL of the source repository.
    pub repository_url: String,
    /// Branch (or other ref) to follow. `HEAD` means the default branch.
    pub branch: String,
    /// Path of the project inside the repository; empty for the root.
    pub project_path: PathBuf,
}

impl DeploymentTarget {
    pub const DEFAULT_BRANCH: &'static str = "HEAD";

    pub fn new(
        repository_url: impl Into<String>,
        branch: Option<String>,
        project_path: Option<PathBuf>,
    ) -> Self {
        Self {
            repository_url: repository_url.into(),
            branch: branch.unwrap_or_else(|| Self::DEFAULT_BRANCH.to_string()),
            project_path: project_path.unwrap_or_default(),
        }
    }
}
