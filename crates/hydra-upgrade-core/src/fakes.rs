//! In-memory fakes for the pipeline traits (testing only)
//!
//! Every fake appends to a shared [`CallLog`], so a test can assert on the
//! exact order of external calls across all components of a run.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nix_env_manager::RebuildOperation;

use crate::domain::{
    ArtifactMetadata, ArtifactRef, Build, Evaluation, Result, UpgradeError, UpgradeTarget,
};
use crate::traits::{BuildStatusSource, HostProbe, MetadataProvider, ProbeResult, UpgradeExecutor};

// ---------------------------------------------------------------------------
// CallLog
// ---------------------------------------------------------------------------

/// One external call observed by a fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LatestBuild,
    Eval {
        build: u64,
    },
    Metadata {
        reference: String,
    },
    Probe {
        host: String,
    },
    Execute {
        operation: RebuildOperation,
        flake_ref: String,
        extra_args: Vec<String>,
    },
    Reboot,
}

/// Ordered, shared record of calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Finished build with the given status, attached to evaluation `id + 1000`.
pub fn finished_build(id: u64, status: i32) -> Build {
    Build {
        id,
        finished: true,
        status: Some(status),
        evals: vec![id + 1000],
    }
}

pub fn unfinished_build(id: u64) -> Build {
    Build {
        id,
        finished: false,
        status: None,
        evals: vec![id + 1000],
    }
}

// ---------------------------------------------------------------------------
// FakeBuildSource
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeBuildSource {
    log: CallLog,
    pub latest: Result<Build>,
    pub eval: Result<Evaluation>,
}

impl FakeBuildSource {
    pub fn new(log: CallLog, latest: Build, flake: &str) -> Self {
        let eval = Evaluation {
            id: latest.evals.first().copied().unwrap_or_default(),
            flake: flake.to_string(),
        };
        Self {
            log,
            latest: Ok(latest),
            eval: Ok(eval),
        }
    }

    pub fn failing(log: CallLog, err: UpgradeError) -> Self {
        Self {
            log,
            latest: Err(err.clone()),
            eval: Err(err),
        }
    }
}

#[async_trait]
impl BuildStatusSource for FakeBuildSource {
    async fn latest_build(&self) -> Result<Build> {
        self.log.record(Call::LatestBuild);
        self.latest.clone()
    }

    async fn eval(&self, build: &Build) -> Result<Evaluation> {
        self.log.record(Call::Eval { build: build.id });
        self.eval.clone()
    }
}

// ---------------------------------------------------------------------------
// FakeMetadataProvider
// ---------------------------------------------------------------------------

/// Answers `CurrentSystem` with `current` and any flake with `candidate`.
#[derive(Debug)]
pub struct FakeMetadataProvider {
    log: CallLog,
    pub current: Result<ArtifactMetadata>,
    pub candidate: Result<ArtifactMetadata>,
}

impl FakeMetadataProvider {
    pub fn new(log: CallLog, current: i64, candidate: i64, original_url: &str) -> Self {
        Self {
            log,
            current: Ok(ArtifactMetadata::new(current, original_url)),
            candidate: Ok(ArtifactMetadata::new(candidate, original_url)),
        }
    }
}

#[async_trait]
impl MetadataProvider for FakeMetadataProvider {
    async fn metadata(&self, artifact: &ArtifactRef) -> Result<ArtifactMetadata> {
        self.log.record(Call::Metadata {
            reference: artifact.to_string(),
        });
        match artifact {
            ArtifactRef::CurrentSystem => self.current.clone(),
            ArtifactRef::Flake(_) => self.candidate.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// FakeProbe
// ---------------------------------------------------------------------------

/// Every host is reachable except the listed ones.
#[derive(Debug)]
pub struct FakeProbe {
    log: CallLog,
    unreachable: HashSet<String>,
}

impl FakeProbe {
    pub fn new(log: CallLog, unreachable: &[&str]) -> Self {
        Self {
            log,
            unreachable: unreachable.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[async_trait]
impl HostProbe for FakeProbe {
    async fn probe(&self, host: &str) -> ProbeResult {
        self.log.record(Call::Probe {
            host: host.to_string(),
        });
        if self.unreachable.contains(host) {
            ProbeResult::Unreachable("100% packet loss".to_string())
        } else {
            ProbeResult::Reachable
        }
    }
}

// ---------------------------------------------------------------------------
// FakeExecutor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FakeExecutor {
    log: CallLog,
    pub execute_result: Result<()>,
    pub reboot_result: Result<()>,
}

impl FakeExecutor {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            execute_result: Ok(()),
            reboot_result: Ok(()),
        }
    }

    pub fn failing_execute(log: CallLog, err: UpgradeError) -> Self {
        Self {
            log,
            execute_result: Err(err),
            reboot_result: Ok(()),
        }
    }
}

#[async_trait]
impl UpgradeExecutor for FakeExecutor {
    async fn execute(
        &self,
        operation: RebuildOperation,
        target: &UpgradeTarget,
        extra_args: &[String],
    ) -> Result<()> {
        self.log.record(Call::Execute {
            operation,
            flake_ref: target.flake_ref(),
            extra_args: extra_args.to_vec(),
        });
        self.execute_result.clone()
    }

    async fn reboot(&self) -> Result<()> {
        self.log.record(Call::Reboot);
        self.reboot_result.clone()
    }
}
