// tests/build_and_workspace.rs

mod common;
use crate::common::init_tracing;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use runsource::build::{find_entry_point, ArtifactLayout, Publisher};
use runsource::errors::RunSourceError;
use runsource::fs::mock::MockFileSystem;
use runsource::fs::{FileSystem, RealFileSystem};
use runsource::workspace::{recreate_dir, Workspace, WorkspaceLayout};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn entry_point_sits_next_to_the_descriptor() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/out/App.runtimeconfig.json", "{}");
    fs.add_file("/out/App.dll", "");
    fs.add_file("/out/App.deps.json", "{}");
    fs.add_file("/out/Newtonsoft.Json.dll", "");

    let entry = find_entry_point(&fs, Path::new("/out"), &ArtifactLayout::default())?;

    assert_eq!(entry, PathBuf::from("/out/App.dll"));
    Ok(())
}

#[test]
fn first_descriptor_in_name_order_wins() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/out/Zeta.runtimeconfig.json", "{}");
    fs.add_file("/out/Alpha.runtimeconfig.json", "{}");
    fs.add_file("/out/Mid.runtimeconfig.json", "{}");

    let entry = find_entry_point(&fs, Path::new("/out"), &ArtifactLayout::default())?;

    assert_eq!(entry, PathBuf::from("/out/Alpha.dll"));
    Ok(())
}

#[test]
fn descriptors_in_subdirectories_are_ignored() {
    let fs = MockFileSystem::new();
    fs.add_file("/out/runtimes/Tool.runtimeconfig.json", "{}");
    fs.add_file("/out/readme.txt", "");

    let err = find_entry_point(&fs, Path::new("/out"), &ArtifactLayout::default())
        .expect_err("no top-level descriptor");

    match err {
        RunSourceError::ArtifactNotFound { dir, suffix } => {
            assert_eq!(dir, PathBuf::from("/out"));
            assert_eq!(suffix, ".runtimeconfig.json");
        }
        other => panic!("expected ArtifactNotFound, got {other:?}"),
    }
}

#[test]
fn empty_publish_output_has_no_entry_point() {
    let fs = MockFileSystem::new();
    fs.add_dir("/ws/published");

    let err = find_entry_point(&fs, Path::new("/ws/published"), &ArtifactLayout::default())
        .expect_err("nothing was published");

    assert!(matches!(err, RunSourceError::ArtifactNotFound { .. }), "got {err:?}");
}

#[test]
fn custom_layout_maps_descriptor_to_artifact() {
    let layout = ArtifactLayout {
        descriptor_suffix: ".manifest".to_string(),
        artifact_extension: ".jar".to_string(),
    };

    assert_eq!(
        layout.entry_point_for(Path::new("/o/service.manifest")),
        Some(PathBuf::from("/o/service.jar"))
    );
    assert_eq!(layout.entry_point_for(Path::new("/o/service.jar")), None);
    assert_eq!(layout.entry_point_for(Path::new("/o/.manifest")), None);
}

#[test]
fn publish_invocation_shape() {
    let publisher = Publisher::default();

    let spec = publisher.command(Path::new("/ws/repo/src/App"), Path::new("/ws/published"));

    assert_eq!(spec.program(), "dotnet");
    assert_eq!(
        spec.args(),
        ["publish", "/ws/repo/src/App", "-c", "Release", "-o", "/ws/published"]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn failing_publish_is_a_build_failure_with_output() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let tool = common::write_script(
        dir.path(),
        "dotnet",
        "echo 'Restoring packages'; echo 'Program.cs(3,1): error CS1002' >&2; exit 1",
    );
    let publisher = Publisher::new(tool.to_string_lossy(), "Release");

    let err = publisher
        .publish(dir.path(), &dir.path().join("out"))
        .await
        .expect_err("build must fail");

    let RunSourceError::BuildFailed(failure) = err else {
        panic!("expected BuildFailed, got {err:?}");
    };
    assert_eq!(failure.exit_code, 1);
    let rendered = failure.to_string();
    assert!(rendered.contains("Restoring packages"), "{rendered}");
    assert!(rendered.contains("error: Program.cs(3,1): error CS1002"), "{rendered}");
    Ok(())
}

#[test]
fn workspace_has_repo_dir_and_is_removed_on_close() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());

    let workspace = Workspace::create(shared, Path::new("/tmp"))?;
    let layout: WorkspaceLayout = workspace.layout().clone();

    assert!(layout.root.starts_with("/tmp"));
    assert_eq!(layout.repo_dir, layout.root.join("repo"));
    assert_eq!(layout.published_dir, layout.root.join("published"));
    assert!(fs.is_dir(&layout.repo_dir));
    assert!(!fs.exists(&layout.published_dir));

    fs.add_file(layout.repo_dir.join("src/App.csproj"), "<Project/>");
    workspace.close()?;

    assert!(!fs.exists(&layout.root));
    assert!(!fs.exists(&layout.repo_dir.join("src/App.csproj")));
    assert!(fs.is_dir(Path::new("/tmp")));
    assert!(fs.read_dir(Path::new("/tmp"))?.is_empty());
    Ok(())
}

#[test]
fn workspace_is_removed_when_dropped_without_close() -> TestResult {
    let fs = MockFileSystem::new();
    let root = {
        let workspace = Workspace::create(Arc::new(fs.clone()), Path::new("/tmp"))?;
        workspace.root().to_path_buf()
    };

    assert!(!fs.exists(&root));
    Ok(())
}

#[test]
fn each_workspace_gets_its_own_directory() -> TestResult {
    let fs = MockFileSystem::new();
    let a = Workspace::create(Arc::new(fs.clone()), Path::new("/tmp"))?;
    let b = Workspace::create(Arc::new(fs.clone()), Path::new("/tmp"))?;

    assert_ne!(a.root(), b.root());

    a.close()?;
    assert!(fs.exists(b.root()));
    b.close()?;
    Ok(())
}

#[test]
fn recreate_dir_empties_the_publish_output() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/ws/published/old/App.dll", "");

    recreate_dir(&fs, Path::new("/ws/published"))?;

    assert!(fs.is_dir(Path::new("/ws/published")));
    assert!(fs.read_dir(Path::new("/ws/published"))?.is_empty());
    assert!(!fs.exists(Path::new("/ws/published/old/App.dll")));
    Ok(())
}

#[test]
fn real_workspace_is_removed_from_disk() -> TestResult {
    init_tracing();
    let temp_root = tempfile::tempdir()?;

    let workspace = Workspace::create(Arc::new(RealFileSystem), temp_root.path())?;
    let root = workspace.root().to_path_buf();
    std::fs::write(workspace.layout().repo_dir.join("file.txt"), "x")?;
    assert!(root.is_dir());

    workspace.close()?;

    assert!(!root.exists());
    assert_eq!(std::fs::read_dir(temp_root.path())?.count(), 0);
    Ok(())
}
