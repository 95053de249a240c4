//! `nixos-rebuild` and reboot.

use crate::command::{CommandRunner, CommandSpec};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Supported `nixos-rebuild` operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RebuildOperation {
    /// Make the new configuration the boot default; applied on next reboot.
    #[default]
    Boot,

    /// Build, activate now, and make it the boot default.
    Switch,
}

impl RebuildOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebuildOperation::Boot => "boot",
            RebuildOperation::Switch => "switch",
        }
    }
}

impl fmt::Display for RebuildOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RebuildOperation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "boot" => Ok(RebuildOperation::Boot),
            "switch" => Ok(RebuildOperation::Switch),
            other => Err(format!(
                "invalid nixos-rebuild operation '{}' (expected boot or switch)",
                other
            )),
        }
    }
}

pub fn rebuild_command(
    operation: RebuildOperation,
    flake_ref: &str,
    extra_args: &[String],
) -> CommandSpec {
    let mut args = vec![
        operation.as_str().to_string(),
        "--flake".to_string(),
        flake_ref.to_string(),
    ];
    args.extend(extra_args.iter().cloned());
    CommandSpec::new("nixos-rebuild", args)
}

/// Run `nixos-rebuild <operation> --flake <flake_ref> [extra_args...]`.
pub async fn nixos_rebuild(
    runner: &dyn CommandRunner,
    operation: RebuildOperation,
    flake_ref: &str,
    extra_args: &[String],
) -> Result<()> {
    let spec = rebuild_command(operation, flake_ref, extra_args);
    info!(command = %spec, "Running nixos-rebuild");
    runner.run(&spec).await?.ensure_success()?;
    Ok(())
}

/// Ask systemd to reboot the machine.
///
/// The process is usually terminated shortly after this returns.
pub async fn reboot(runner: &dyn CommandRunner) -> Result<()> {
    runner
        .run(&CommandSpec::new("systemctl", ["reboot"]))
        .await?
        .ensure_success()?;
    Ok(())
}
