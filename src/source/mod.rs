// src/source/mod.rs

//! Source repository access.
//!
//! [`git::GitClient`] wraps the handful of `git` invocations the deployment
//! loop needs: resolving a branch to a commit on the remote, and advancing a
//! local clone to an exact commit.

pub mod git;

pub use git::GitClient;
