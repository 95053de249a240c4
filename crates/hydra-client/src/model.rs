//! Hydra JSON wire types.
//!
//! Only the fields the upgrader reads are modelled; Hydra sends many more
//! and they are ignored.

use serde::{Deserialize, Serialize};

/// `buildstatus` value Hydra reports for a successful build.
pub const BUILD_STATUS_SUCCESS: i32 = 0;

/// A build as returned by `/api/latestbuilds` or `/build/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraBuild {
    pub id: u64,

    /// 1 once the build has stopped, 0 while queued or running.
    pub finished: i64,

    /// Null until the build finishes.
    #[serde(default)]
    pub buildstatus: Option<i32>,

    /// Evaluations this build belongs to.
    #[serde(default)]
    pub jobsetevals: Vec<u64>,
}

impl HydraBuild {
    pub fn is_finished(&self) -> bool {
        self.finished == 1
    }

    pub fn succeeded(&self) -> bool {
        self.is_finished() && self.buildstatus == Some(BUILD_STATUS_SUCCESS)
    }
}

/// A jobset evaluation as returned by `/eval/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraEval {
    pub id: u64,

    /// Locked flake reference the evaluation ran against.
    pub flake: String,
}
