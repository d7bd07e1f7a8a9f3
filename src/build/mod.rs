// src/build/mod.rs

//! Build pipeline: publish a checked-out project and locate the runnable
//! entry point in the publish output.

pub mod artifact;
pub mod publish;

pub use artifact::{find_entry_point, ArtifactLayout};
pub use publish::Publisher;
