//! Error taxonomy for an upgrade run.
//!
//! Every variant ends the run. Health-gate refusals are not errors; they are
//! reported through [`Outcome`](crate::orchestrator::Outcome).

use hydra_client::HydraError;
use nix_env_manager::NixError;

/// Errors produced by the upgrade pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpgradeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("`{command}` failed with exit code {exit_code}: {stderr}")]
    Execution {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("`{command}` timed out after {secs} seconds")]
    Timeout { command: String, secs: u64 },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl UpgradeError {
    /// Short machine-readable category, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            UpgradeError::Network(_) => "network",
            UpgradeError::Parse(_) => "parse",
            UpgradeError::Execution { .. } => "execution",
            UpgradeError::Timeout { .. } => "timeout",
            UpgradeError::Config(_) => "config",
        }
    }
}

impl From<HydraError> for UpgradeError {
    fn from(err: HydraError) -> Self {
        match err {
            HydraError::Http(_) | HydraError::Status { .. } => UpgradeError::Network(err.to_string()),
            HydraError::Decode { .. } | HydraError::NoBuilds { .. } | HydraError::NoEvaluation { .. } => {
                UpgradeError::Parse(err.to_string())
            }
            HydraError::InvalidInstance { .. } => UpgradeError::Config(err.to_string()),
        }
    }
}

impl From<NixError> for UpgradeError {
    fn from(err: NixError) -> Self {
        match err {
            NixError::CommandFailed {
                program,
                exit_code,
                stderr,
            } => UpgradeError::Execution {
                command: program,
                exit_code,
                stderr,
            },
            NixError::ProgramNotFound { program } => UpgradeError::Execution {
                command: program,
                exit_code: 127,
                stderr: "not installed or not in PATH".to_string(),
            },
            NixError::Timeout { program, secs } => UpgradeError::Timeout {
                command: program,
                secs,
            },
            NixError::Io(e) => UpgradeError::Execution {
                command: "spawn".to_string(),
                exit_code: -1,
                stderr: e.to_string(),
            },
            NixError::Json(e) => UpgradeError::Parse(e.to_string()),
        }
    }
}

/// Result type for upgrade pipeline operations.
pub type Result<T> = std::result::Result<T, UpgradeError>;
