//! Hydra Upgrade Core Library
//!
//! Decides whether a NixOS host should move to the configuration its Hydra
//! job last built, and performs the upgrade once every gate passes.
//!
//! The [`Orchestrator`] owns the control flow; the components it drives are
//! traits ([`BuildStatusSource`], [`MetadataProvider`], [`HostProbe`],
//! [`UpgradeExecutor`]) with production implementations in [`adapters`] and
//! in-memory fakes in [`fakes`].

pub mod adapters;
pub mod domain;
pub mod fakes;
pub mod health;
pub mod obs;
pub mod orchestrator;
pub mod telemetry;
pub mod traits;

pub use adapters::{HydraBuildSource, NixMetadataProvider, NixosRebuildExecutor, PingProbe};
pub use domain::{
    ArtifactMetadata, ArtifactRef, Build, Evaluation, HydraCoordinates, Result, RunConfig,
    Timeouts, UpgradeError, UpgradeTarget,
};
pub use health::{CanaryFailure, HealthGate};
pub use orchestrator::{Orchestrator, Outcome, Step, EXIT_FAILURE};
pub use telemetry::{init_tracing, LogFormat};
pub use traits::{BuildStatusSource, HostProbe, MetadataProvider, ProbeResult, UpgradeExecutor};

pub use nix_env_manager::{RebuildOperation, SystemCommandRunner};
