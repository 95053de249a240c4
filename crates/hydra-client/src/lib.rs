//! Hydra API client
//!
//! Hydra answers its HTML routes with JSON when asked for
//! `application/json`. Two queries are needed to promote a build:
//!
//! - the latest build of a `project/jobset/job` ([`HydraClient::latest_build`])
//! - the evaluation that build belongs to ([`HydraClient::eval`]), which
//!   names the flake the build was produced from

pub mod client;
pub mod error;
pub mod model;

pub use client::{HydraClient, HydraConfig};
pub use error::HydraError;
pub use model::{HydraBuild, HydraEval, BUILD_STATUS_SUCCESS};

/// Result type for Hydra API calls
pub type Result<T> = std::result::Result<T, HydraError>;
