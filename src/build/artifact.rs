// src/build/artifact.rs

use std::path::{Path, PathBuf};

use crate::errors::{Result, RunSourceError};
use crate::fs::FileSystem;

/// How the runnable artifact is named relative to its runtime descriptor.
///
/// With the defaults, `out/App.runtimeconfig.json` means the entry point is
/// `out/App.dll`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub descriptor_suffix: String,
    pub artifact_extension: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            descriptor_suffix: ".runtimeconfig.json".to_string(),
            artifact_extension: ".dll".to_string(),
        }
    }
}

impl ArtifactLayout {
    /// Entry-point path for a descriptor path, or `None` if `descriptor`
    /// does not carry the descriptor suffix.
    pub fn entry_point_for(&self, descriptor: &Path) -> Option<PathBuf> {
        let name = descriptor.file_name()?.to_str()?;
        let stem = name.strip_suffix(self.descriptor_suffix.as_str())?;
        if stem.is_empty() {
            return None;
        }
        Some(descriptor.with_file_name(format!("{stem}{}", self.artifact_extension)))
    }
}

/// Locate the entry point in a publish output directory.
///
/// Scans the top level of `output_dir` for the runtime descriptor. If there
/// are several, the lexicographically first wins. No descriptor at all is a
/// build-contract violation (`ArtifactNotFound`).
pub fn find_entry_point(
    fs: &dyn FileSystem,
    output_dir: &Path,
    layout: &ArtifactLayout,
) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs
        .read_dir(output_dir)?
        .into_iter()
        .filter(|p| fs.is_file(p))
        .filter_map(|p| layout.entry_point_for(&p))
        .collect();
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| RunSourceError::ArtifactNotFound {
            dir: output_dir.to_path_buf(),
            suffix: layout.descriptor_suffix.clone(),
        })
}
