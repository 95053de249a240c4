//! Component seams of the upgrade pipeline.
//!
//! The orchestrator only talks to these traits:
//! - `BuildStatusSource`: latest CI build and its evaluation
//! - `MetadataProvider`: freshness of a flake
//! - `HostProbe`: liveness of one canary host
//! - `UpgradeExecutor`: `nixos-rebuild` and reboot
//!
//! Real implementations live in [`crate::adapters`]; in-memory ones in
//! [`crate::fakes`].

use async_trait::async_trait;
use nix_env_manager::RebuildOperation;

use crate::domain::{ArtifactMetadata, ArtifactRef, Build, Evaluation, Result, UpgradeTarget};

#[async_trait]
pub trait BuildStatusSource: Send + Sync {
    /// Most recent build of the configured job.
    async fn latest_build(&self) -> Result<Build>;

    /// Evaluation that produced `build`. Only called for successful builds.
    async fn eval(&self, build: &Build) -> Result<Evaluation>;
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn metadata(&self, artifact: &ArtifactRef) -> Result<ArtifactMetadata>;
}

/// Result of probing a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    Reachable,
    /// Carries a human-readable reason.
    Unreachable(String),
}

#[async_trait]
pub trait HostProbe: Send + Sync {
    async fn probe(&self, host: &str) -> ProbeResult;
}

#[async_trait]
pub trait UpgradeExecutor: Send + Sync {
    async fn execute(
        &self,
        operation: RebuildOperation,
        target: &UpgradeTarget,
        extra_args: &[String],
    ) -> Result<()>;

    /// May not return: the host can go down before the call completes.
    async fn reboot(&self) -> Result<()>;
}
