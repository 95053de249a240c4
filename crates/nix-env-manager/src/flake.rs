//! Nix Flake metadata
//!
//! Wraps `nix flake metadata --json`, which reports when a flake was last
//! modified and the URL it was originally referenced by.

use crate::command::{CommandRunner, CommandSpec};
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Flake reference that resolves to the configuration of the running system.
pub const CURRENT_SYSTEM_FLAKE: &str = "self";

/// Metadata from a Nix Flake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlakeMetadata {
    /// Last modified timestamp (unix seconds)
    pub last_modified: i64,
    /// Original flake URL
    pub original_url: String,
    /// Flake description
    #[serde(default)]
    pub description: Option<String>,
    /// Resolved URL
    #[serde(default)]
    pub resolved_url: Option<String>,
    /// Locked URL
    #[serde(default)]
    pub url: Option<String>,
    /// Revision (if from git)
    #[serde(default)]
    pub revision: Option<String>,
}

/// Build the `nix flake metadata` invocation for `reference`.
///
/// `reference` is passed to nix verbatim: [`CURRENT_SYSTEM_FLAKE`] or any
/// flake URI such as `github:owner/repo/<rev>`.
pub fn metadata_command(reference: &str) -> CommandSpec {
    CommandSpec::new("nix", ["flake", "metadata", reference, "--json"])
}

/// Run `nix flake metadata <reference> --json` and parse the result.
pub async fn get_flake_metadata(
    runner: &dyn CommandRunner,
    reference: &str,
) -> Result<FlakeMetadata> {
    let output = runner
        .run(&metadata_command(reference))
        .await?
        .ensure_success()?;

    let metadata: FlakeMetadata = serde_json::from_slice(&output.stdout)?;
    debug!(
        reference = %reference,
        last_modified = metadata.last_modified,
        original_url = %metadata.original_url,
        "Flake metadata"
    );
    Ok(metadata)
}
