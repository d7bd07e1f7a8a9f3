// src/exec/command.rs

//! Run external tools to completion and capture their output.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{CommandFailed, Result, RunSourceError};

/// A program invocation: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn path_arg(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Human-readable `program arg1 arg2 ...`, used in errors and logs.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// One line of process output, tagged by the stream it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Combined stdout/stderr of a finished process, in arrival order.
///
/// Relative ordering between the two streams is whatever the OS delivered;
/// lines within one stream keep their emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    lines: Vec<OutputLine>,
}

impl CapturedOutput {
    pub fn push(&mut self, line: OutputLine) {
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match l {
            OutputLine::Stdout(s) => Some(s.as_str()),
            OutputLine::Stderr(_) => None,
        })
    }

    pub fn stderr_lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match l {
            OutputLine::Stderr(s) => Some(s.as_str()),
            OutputLine::Stdout(_) => None,
        })
    }

    /// Stdout only, newline-joined. Used for parsing tool output.
    pub fn stdout_text(&self) -> String {
        let mut text = String::new();
        for line in self.stdout_lines() {
            text.push_str(line);
            text.push('\n');
        }
        text
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            match line {
                OutputLine::Stdout(s) => writeln!(f, "{s}")?,
                OutputLine::Stderr(s) => writeln!(f, "error: {s}")?,
            }
        }
        Ok(())
    }
}

/// Run a command to completion; a non-zero exit becomes `CommandFailed`.
pub async fn run(spec: &CommandSpec) -> Result<CapturedOutput> {
    let (exit_code, output) = run_unchecked(spec).await?;
    if exit_code != 0 {
        return Err(CommandFailed {
            command_line: spec.command_line(),
            exit_code,
            output,
        }
        .into());
    }
    Ok(output)
}

/// Run a command to completion and return its exit code and output,
/// whatever the exit code is.
///
/// A process terminated by a signal reports exit code -1.
pub async fn run_unchecked(spec: &CommandSpec) -> Result<(i32, CapturedOutput)> {
    let command_line = spec.command_line();
    debug!(cmd = %command_line, dir = ?spec.current_dir, "running command");

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| RunSourceError::SpawnFailed {
        command_line: command_line.clone(),
        source,
    })?;

    // Both pipes feed one channel; the receiver sees lines in arrival order.
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<OutputLine>();

    if let Some(stdout) = child.stdout.take() {
        let tx = line_tx.clone();
        tokio::spawn(for_each_line(stdout, move |line| {
            let _ = tx.send(OutputLine::Stdout(line));
        }));
    }

    if let Some(stderr) = child.stderr.take() {
        let tx = line_tx.clone();
        tokio::spawn(for_each_line(stderr, move |line| {
            let _ = tx.send(OutputLine::Stderr(line));
        }));
    }

    drop(line_tx);

    let mut output = CapturedOutput::default();
    while let Some(line) = line_rx.recv().await {
        match &line {
            OutputLine::Stdout(s) => debug!(cmd = %command_line, "stdout: {}", s),
            OutputLine::Stderr(s) => debug!(cmd = %command_line, "stderr: {}", s),
        }
        output.push(line);
    }

    let status = child.wait().await?;
    let code = status.code().unwrap_or(-1);

    debug!(
        cmd = %command_line,
        exit_code = code,
        success = status.success(),
        "command exited"
    );

    Ok((code, output))
}

/// Read `reader` to end of stream, handing every line to `on_line`.
///
/// Lines end at `\n` (a trailing `\r` is dropped too). Bytes that are not
/// valid UTF-8 are replaced rather than ending the stream, so the writer never
/// sees its pipe closed early. Only a read error stops the loop.
pub(crate) async fn for_each_line<R, F>(reader: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                }
                on_line(String::from_utf8_lossy(&buf).into_owned());
            }
            Err(e) => {
                debug!(error = %e, "output stream read failed");
                break;
            }
        }
    }
}
