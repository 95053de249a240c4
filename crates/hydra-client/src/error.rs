//! Error types for hydra-client

use thiserror::Error;

/// Errors returned by [`HydraClient`](crate::HydraClient)
#[derive(Error, Debug)]
pub enum HydraError {
    /// Transport failure (connect, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Hydra answered with a non-success status
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body did not match the expected shape
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The job has never been built
    #[error("no builds found for {project}:{jobset}:{job}")]
    NoBuilds {
        project: String,
        jobset: String,
        job: String,
    },

    /// The build is not attached to any evaluation
    #[error("build {build} has no evaluations")]
    NoEvaluation { build: u64 },

    /// Configured instance is not a usable base URL
    #[error("invalid Hydra instance URL '{instance}': {message}")]
    InvalidInstance { instance: String, message: String },
}
