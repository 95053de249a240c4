//! CI build and evaluation snapshots.

use hydra_client::{HydraBuild, HydraEval, BUILD_STATUS_SUCCESS};
use serde::{Deserialize, Serialize};

/// One build attempt of the configured job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    pub finished: bool,
    /// `None` while the build has not finished.
    pub status: Option<i32>,
    /// Evaluations the build belongs to, in the order the CI service lists them.
    pub evals: Vec<u64>,
}

impl Build {
    pub fn succeeded(&self) -> bool {
        self.finished && self.status == Some(BUILD_STATUS_SUCCESS)
    }
}

impl From<HydraBuild> for Build {
    fn from(build: HydraBuild) -> Self {
        Build {
            id: build.id,
            finished: build.is_finished(),
            status: build.buildstatus,
            evals: build.jobsetevals,
        }
    }
}

impl From<&Build> for HydraBuild {
    fn from(build: &Build) -> Self {
        HydraBuild {
            id: build.id,
            finished: i64::from(build.finished),
            buildstatus: build.status,
            jobsetevals: build.evals.clone(),
        }
    }
}

/// The evaluation a successful build was produced by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: u64,
    /// Flake reference of the evaluated configuration.
    pub flake: String,
}

impl From<HydraEval> for Evaluation {
    fn from(eval: HydraEval) -> Self {
        Evaluation {
            id: eval.id,
            flake: eval.flake,
        }
    }
}
