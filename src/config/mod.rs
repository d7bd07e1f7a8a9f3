// src/config/mod.rs

//! Settings for a deployment run.
//!
//! Settings come from an optional TOML file (`RunSource.toml` or
//! `--config <PATH>`), with built-in defaults for everything. The CLI
//! supplies the deployment target and may override the poll interval.
//!
//! - [`model`]: raw TOML shape and the validated [`Settings`].
//! - [`validate`]: `RawSettingsFile` → `Settings`.
//! - [`loader`]: file discovery and reading.
//! - [`duration`]: the `5m` / `250ms` / `1h30m` duration grammar.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, load_settings};
pub use model::{DeploySection, RawSettingsFile, RetryPolicy, Settings, ToolchainSection};
