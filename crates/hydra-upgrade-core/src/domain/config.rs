//! Run configuration.
//!
//! Built once by the binary from flags, environment and config file, then
//! passed by reference to every component.

use nix_env_manager::RebuildOperation;
use serde::{Deserialize, Serialize};

use super::error::{Result, UpgradeError};

/// Hydra job to follow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraCoordinates {
    pub instance: String,
    pub project: String,
    pub jobset: String,
    pub job: String,
}

/// Bounds applied to every blocking external call. 0 disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    pub http_secs: u64,
    pub command_secs: u64,
    pub probe_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            http_secs: 30,
            command_secs: 3600,
            probe_secs: 5,
        }
    }
}

/// Validated settings for one upgrade run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub hydra: HydraCoordinates,
    /// Probed in order before upgrading; empty means no gate.
    pub canary_hosts: Vec<String>,
    /// `nixosConfigurations.<host>` attribute to build.
    pub host: String,
    pub operation: RebuildOperation,
    /// Appended verbatim to the `nixos-rebuild` command line.
    pub rebuild_args: Vec<String>,
    pub reboot: bool,
    pub debug: bool,
    pub timeouts: Timeouts,
}

impl RunConfig {
    /// Check required settings, reporting every missing key at once.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("hydra.instance", &self.hydra.instance),
            ("hydra.project", &self.hydra.project),
            ("hydra.jobset", &self.hydra.jobset),
            ("hydra.job", &self.hydra.job),
            ("nixos_rebuild.host", &self.host),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(UpgradeError::Config(format!(
                "missing required value(s): {}",
                missing.join(", ")
            )));
        }

        let instance = self.hydra.instance.trim();
        if !(instance.starts_with("http://") || instance.starts_with("https://")) {
            return Err(UpgradeError::Config(format!(
                "hydra.instance must be an http(s) URL, got '{}'",
                self.hydra.instance
            )));
        }

        if self.canary_hosts.iter().any(|h| h.trim().is_empty()) {
            return Err(UpgradeError::Config(
                "healthcheck.canary_hosts contains an empty host name".to_string(),
            ));
        }
        if let Some(host) = self.canary_hosts.iter().find(|h| h.trim_start().starts_with('-')) {
            return Err(UpgradeError::Config(format!(
                "healthcheck.canary_hosts entry '{}' must not start with '-'",
                host
            )));
        }

        Ok(())
    }
}
