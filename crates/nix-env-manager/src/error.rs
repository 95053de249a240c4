//! Error types for nix-env-manager

use thiserror::Error;

/// Errors that can occur while driving Nix and host tooling
#[derive(Error, Debug)]
pub enum NixError {
    /// Executable not found in PATH
    #[error("{program} is not installed or not in PATH")]
    ProgramNotFound { program: String },

    /// Command ran but exited non-zero
    #[error("{program} exited with code {exit_code}: {stderr}")]
    CommandFailed {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    /// Command exceeded its time bound and was killed
    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_displays_program_and_stderr() {
        let err = NixError::CommandFailed {
            program: "nix".to_string(),
            exit_code: 1,
            stderr: "error: flake not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("nix"));
        assert!(msg.contains("flake not found"));
    }

    #[test]
    fn test_timeout_displays_seconds() {
        let err = NixError::Timeout {
            program: "nixos-rebuild".to_string(),
            secs: 30,
        };
        assert!(err.to_string().contains("30 seconds"));
    }
}
