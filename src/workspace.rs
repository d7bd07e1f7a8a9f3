// src/workspace.rs

//! Scratch directory owned by one supervisor run.
//!
//! Layout: `{temp_root}/{run_id}/repo` (persistent clone) and
//! `{temp_root}/{run_id}/published` (build output, recreated every cycle).
//! The whole tree is removed exactly once: by [`Workspace::close`] on the
//! normal path, or by `Drop` if the owner unwinds or forgets to close it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::errors::Result;
use crate::fs::FileSystem;

const REPO_DIR: &str = "repo";
const PUBLISHED_DIR: &str = "published";

/// Paths inside a workspace. Cheap to clone and hand to other components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub repo_dir: PathBuf,
    pub published_dir: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: PathBuf) -> Self {
        Self {
            repo_dir: root.join(REPO_DIR),
            published_dir: root.join(PUBLISHED_DIR),
            root,
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    fs: Arc<dyn FileSystem>,
    layout: WorkspaceLayout,
    removed: bool,
}

impl Workspace {
    /// Create a uniquely named workspace under `temp_root`, with an empty
    /// `repo` directory.
    pub fn create(fs: Arc<dyn FileSystem>, temp_root: &Path) -> Result<Self> {
        let run_id = Ulid::new().to_string().to_lowercase();
        let layout = WorkspaceLayout::new(temp_root.join(run_id));

        fs.create_dir_all(&layout.repo_dir)?;
        info!(root = ?layout.root, "workspace created");

        Ok(Self {
            fs,
            layout,
            removed: false,
        })
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn root(&self) -> &Path {
        &self.layout.root
    }

    /// Remove the workspace. Consumes it so it cannot be removed twice.
    pub fn close(mut self) -> Result<()> {
        self.removed = true;
        remove_tree(self.fs.as_ref(), &self.layout.root)?;
        info!(root = ?self.layout.root, "workspace removed");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        self.removed = true;
        match remove_tree(self.fs.as_ref(), &self.layout.root) {
            Ok(()) => debug!(root = ?self.layout.root, "workspace removed on drop"),
            Err(e) => warn!(root = ?self.layout.root, error = %e, "failed to remove workspace"),
        }
    }
}

/// Remove `dir` recursively if it exists.
pub fn remove_tree(fs: &dyn FileSystem, dir: &Path) -> Result<()> {
    if fs.exists(dir) {
        fs.remove_dir_all(dir)?;
    }
    Ok(())
}

/// Make `dir` an empty directory, removing whatever was there.
pub fn recreate_dir(fs: &dyn FileSystem, dir: &Path) -> Result<()> {
    remove_tree(fs, dir)?;
    fs.create_dir_all(dir)?;
    Ok(())
}
