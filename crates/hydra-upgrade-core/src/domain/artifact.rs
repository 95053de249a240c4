//! Artifact provenance and the resolved upgrade target.

use chrono::{DateTime, Utc};
use nix_env_manager::{FlakeMetadata, CURRENT_SYSTEM_FLAKE};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which configuration to describe.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactRef {
    /// The configuration the host is running now.
    CurrentSystem,
    /// A flake URI reported by the CI service.
    Flake(String),
}

impl ArtifactRef {
    /// Reference as understood by `nix flake metadata`.
    pub fn as_str(&self) -> &str {
        match self {
            ArtifactRef::CurrentSystem => CURRENT_SYSTEM_FLAKE,
            ArtifactRef::Flake(uri) => uri,
        }
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness and origin of a buildable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Unix seconds.
    pub last_modified: i64,
    pub original_url: String,
}

impl ArtifactMetadata {
    pub fn new(last_modified: i64, original_url: impl Into<String>) -> Self {
        Self {
            last_modified,
            original_url: original_url.into(),
        }
    }

    /// Strictly newer; equal timestamps are not an upgrade.
    pub fn is_newer_than(&self, other: &ArtifactMetadata) -> bool {
        self.last_modified > other.last_modified
    }

    pub fn last_modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.last_modified, 0)
    }
}

impl From<FlakeMetadata> for ArtifactMetadata {
    fn from(metadata: FlakeMetadata) -> Self {
        ArtifactMetadata {
            last_modified: metadata.last_modified,
            original_url: metadata.original_url,
        }
    }
}

/// Fully qualified `<originalUrl>#<host>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeTarget {
    pub original_url: String,
    pub host: String,
}

impl UpgradeTarget {
    pub fn resolve(metadata: &ArtifactMetadata, host: &str) -> Self {
        Self {
            original_url: metadata.original_url.clone(),
            host: host.to_string(),
        }
    }

    pub fn flake_ref(&self) -> String {
        format!("{}#{}", self.original_url, self.host)
    }
}

impl fmt::Display for UpgradeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.original_url, self.host)
    }
}
