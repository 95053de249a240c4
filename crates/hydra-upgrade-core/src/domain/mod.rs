//! Domain models for the upgrade pipeline.
//!
//! - `Build`/`Evaluation`: what the CI service reports
//! - `ArtifactMetadata`: freshness of the running and candidate configurations
//! - `UpgradeTarget`: the flake reference handed to `nixos-rebuild`
//! - `RunConfig`: validated settings for one run

pub mod artifact;
pub mod build;
pub mod config;
pub mod error;

pub use artifact::{ArtifactMetadata, ArtifactRef, UpgradeTarget};
pub use build::{Build, Evaluation};
pub use config::{HydraCoordinates, RunConfig, Timeouts};
pub use error::{Result, UpgradeError};
