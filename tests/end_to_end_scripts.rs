// tests/end_to_end_scripts.rs
//
// Full runs of `deploy` against shell-script stand-ins for git, the build
// toolchain and the launcher.
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, read_or_empty, wait_until, write_atomic, write_script};

use std::error::Error;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use runsource::config::Settings;
use runsource::deploy;
use runsource::types::DeploymentTarget;
use runsource_test_utils::builders::SettingsBuilder;
use runsource_test_utils::with_timeout;

type TestResult = Result<(), Box<dyn Error>>;

struct Toolchain {
    _dir: tempfile::TempDir,
    /// Commit the fake remote currently reports.
    commit_file: PathBuf,
    log: PathBuf,
    temp_root: PathBuf,
    settings: Settings,
}

impl Toolchain {
    fn new(build_succeeds: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        let temp_root = dir.path().join("work");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::create_dir_all(&temp_root).unwrap();

        let commit_file = dir.path().join("remote-commit");
        let log = dir.path().join("log");
        write_atomic(&commit_file, "aaa111");

        let git = write_script(
            &bin,
            "git",
            &format!(
                r#"echo "git $*" >> '{log}'
case "$1" in
  ls-remote) printf '%s\trefs/heads/main\n' "$(cat '{commit}')" ;;
  checkout) printf '%s' "$2" > .commit ;;
esac"#,
                log = log.display(),
                commit = commit_file.display()
            ),
        );

        let build_body = if build_succeeds {
            format!(
                r#"echo "build $2" >> '{log}'
mkdir -p "$6"
printf '{{}}' > "$6/App.runtimeconfig.json"
cp "$2/.commit" "$6/App.dll""#,
                log = log.display()
            )
        } else {
            format!(
                r#"echo "build $2" >> '{log}'
echo "Program.cs(1,1): error CS0116" >&2
exit 1"#,
                log = log.display()
            )
        };
        let build = write_script(&bin, "dotnet", &build_body);

        let launcher = write_script(
            &bin,
            "launcher",
            &format!(
                r#"echo "started $(cat "$1")" >> '{log}'
exec sleep 30"#,
                log = log.display()
            ),
        );

        let settings = SettingsBuilder::new()
            .poll_interval("50ms")
            .temp_root(&temp_root)
            .git(&git)
            .build_program(&build)
            .launcher(&launcher)
            .build();

        Self {
            _dir: dir,
            commit_file,
            log,
            temp_root,
            settings,
        }
    }

    fn log_lines(&self) -> Vec<String> {
        read_or_empty(&self.log).lines().map(str::to_string).collect()
    }

    fn logged(&self, line: &str) -> bool {
        self.log_lines().iter().any(|l| l == line)
    }

    fn workspaces_left(&self) -> usize {
        std::fs::read_dir(&self.temp_root).unwrap().count()
    }
}

fn target() -> DeploymentTarget {
    DeploymentTarget::new("https://example.com/app.git", Some("main".into()), None)
}

fn position(lines: &[String], wanted: &str) -> usize {
    lines
        .iter()
        .position(|l| l == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not in {lines:?}"))
}

#[tokio::test]
async fn new_commit_replaces_running_application() -> TestResult {
    init_tracing();
    let tools = Toolchain::new(true);
    let (tx, rx) = mpsc::channel(1);

    let (report, ()) = with_timeout(async {
        tokio::join!(deploy(target(), tools.settings.clone(), Some(rx)), async {
            wait_until("first app started", || tools.logged("started aaa111")).await;
            write_atomic(&tools.commit_file, "bbb222");
            wait_until("second app started", || tools.logged("started bbb222")).await;
            tx.send(()).await.expect("runtime is listening");
        })
    })
    .await;
    let report = report?;

    assert!(report.interrupted);
    assert_eq!(report.cycles, 2);

    let lines = tools.log_lines();
    assert_eq!(lines.iter().filter(|l| l.starts_with("started")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("build")).count(), 2);
    assert!(position(&lines, "started aaa111") < position(&lines, "git fetch origin bbb222"));
    assert!(position(&lines, "git fetch origin bbb222") < position(&lines, "git checkout bbb222"));
    assert!(position(&lines, "git checkout bbb222") < position(&lines, "started bbb222"));
    assert!(lines.contains(&"git remote add origin https://example.com/app.git".to_string()));
    assert!(lines.contains(&"git ls-remote https://example.com/app.git main".to_string()));

    assert_eq!(tools.workspaces_left(), 0);
    Ok(())
}

#[tokio::test]
async fn build_failure_ends_run_and_removes_workspace() -> TestResult {
    init_tracing();
    let tools = Toolchain::new(false);

    let report = with_timeout(deploy(target(), tools.settings.clone(), None)).await?;

    assert!(!report.interrupted);
    assert_eq!(report.cycles, 0);
    let err = report.last_error.expect("build failure reported");
    assert!(err.starts_with("build failed"), "{err}");
    assert!(err.contains("error: Program.cs(1,1): error CS0116"), "{err}");

    assert!(!tools.log_lines().iter().any(|l| l.starts_with("started")));
    assert_eq!(tools.workspaces_left(), 0);
    Ok(())
}

#[tokio::test]
async fn project_path_is_built_from_inside_the_clone() -> TestResult {
    init_tracing();
    let tools = Toolchain::new(false);
    let target = DeploymentTarget::new(
        "https://example.com/app.git",
        None,
        Some(Path::new("src/App").to_path_buf()),
    );

    with_timeout(deploy(target, tools.settings.clone(), None)).await?;

    let lines = tools.log_lines();
    assert!(lines.contains(&"git ls-remote https://example.com/app.git HEAD".to_string()));
    let build = lines
        .iter()
        .find(|l| l.starts_with("build "))
        .expect("build ran");
    assert!(build.ends_with("/repo/src/App"), "{build}");
    Ok(())
}
