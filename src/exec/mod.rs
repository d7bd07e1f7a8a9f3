// src/exec/mod.rs

//! Process execution layer.
//!
//! Everything that spawns an OS process goes through here, using
//! `tokio::process::Command`.
//!
//! - [`command`] runs external tools (git, the build toolchain) to completion
//!   and captures their combined output for diagnostics.
//! - [`supervisor`] starts the deployed application as a long-running child
//!   and terminates it gracefully.

pub mod command;
pub mod supervisor;

pub use command::{CapturedOutput, CommandSpec, OutputLine};
pub use supervisor::{ManagedProcess, OutputMode, ProcessSupervisor};
