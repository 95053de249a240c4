//! Upgrade decision pipeline.
//!
//! The run is a fixed sequence of steps. Each step either hands its output
//! to the next one ([`Step::Next`]) or ends the run with an [`Outcome`]
//! ([`Step::Exit`]); any error from an external call ends the run with that
//! error. Nothing is retried and no step runs twice.
//!
//! 1. fetch latest build
//! 2. build finished? otherwise `BuildUnfinished`
//! 3. build succeeded? otherwise `BuildFailed`
//! 4. fetch evaluation
//! 5. metadata of the running system
//! 6. metadata of the evaluated flake
//! 7. candidate strictly newer? otherwise `AlreadyUpToDate`
//! 8. canary health gate, otherwise `CanaryUnhealthy`
//! 9. `nixos-rebuild`
//! 10. optional reboot

use std::fmt;

use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::domain::{
    ArtifactMetadata, ArtifactRef, Build, Evaluation, Result, RunConfig, UpgradeTarget,
};
use crate::health::HealthGate;
use crate::obs;
use crate::traits::{BuildStatusSource, HostProbe, MetadataProvider, UpgradeExecutor};

/// Process exit status for failed or refused runs.
pub const EXIT_FAILURE: u8 = 1;

/// Terminal result of a run that did not hit an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Latest build is still queued or running.
    BuildUnfinished { build: u64 },
    /// Latest build finished with a non-success status.
    BuildFailed { build: u64, status: Option<i32> },
    /// Candidate is not newer than the running system.
    AlreadyUpToDate { current: i64, candidate: i64 },
    /// A canary host failed its probe.
    CanaryUnhealthy { host: String, reason: String },
    /// `nixos-rebuild` succeeded and no reboot was requested.
    Upgraded { target: UpgradeTarget },
    /// `nixos-rebuild` succeeded and a reboot was requested.
    RebootTriggered { target: UpgradeTarget },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(
            self,
            Outcome::BuildFailed { .. } | Outcome::CanaryUnhealthy { .. }
        )
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            EXIT_FAILURE
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::BuildUnfinished { .. } => "build_unfinished",
            Outcome::BuildFailed { .. } => "build_failed",
            Outcome::AlreadyUpToDate { .. } => "already_up_to_date",
            Outcome::CanaryUnhealthy { .. } => "canary_unhealthy",
            Outcome::Upgraded { .. } => "upgraded",
            Outcome::RebootTriggered { .. } => "reboot_triggered",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::BuildUnfinished { build } => {
                write!(f, "Latest build {} unfinished. Exiting.", build)
            }
            Outcome::BuildFailed { build, status } => match status {
                Some(code) => write!(
                    f,
                    "Latest build {} unsuccessful (buildstatus {}). Exiting.",
                    build, code
                ),
                None => write!(f, "Latest build {} unsuccessful. Exiting.", build),
            },
            Outcome::AlreadyUpToDate { .. } => write!(f, "System is already up to date. Exiting."),
            Outcome::CanaryUnhealthy { host, reason } => {
                write!(f, "Health check failed for {}: {}. Exiting.", host, reason)
            }
            Outcome::Upgraded { target } => write!(f, "System upgrade complete: {}", target),
            Outcome::RebootTriggered { target } => {
                write!(f, "System upgrade complete: {}. Reboot initiated.", target)
            }
        }
    }
}

/// Result of a step that can end the run early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Next(T),
    Exit(Outcome),
}

/// Unwrap `Step::Next` or return the outcome from the enclosing function.
macro_rules! advance {
    ($step:expr) => {
        match $step {
            Step::Next(value) => value,
            Step::Exit(outcome) => return Ok(outcome),
        }
    };
}

/// Sequences one upgrade run over the pipeline components.
pub struct Orchestrator<'a> {
    config: &'a RunConfig,
    builds: &'a dyn BuildStatusSource,
    metadata: &'a dyn MetadataProvider,
    gate: HealthGate<'a>,
    executor: &'a dyn UpgradeExecutor,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a RunConfig,
        builds: &'a dyn BuildStatusSource,
        metadata: &'a dyn MetadataProvider,
        probe: &'a dyn HostProbe,
        executor: &'a dyn UpgradeExecutor,
    ) -> Self {
        Self {
            config,
            builds,
            metadata,
            gate: HealthGate::new(probe),
            executor,
        }
    }

    /// Run the pipeline once inside an `upgrade.run` span.
    pub async fn run(&self) -> Result<Outcome> {
        let run_id = Uuid::new_v4();
        let result = async {
            obs::emit_run_started(self.config);
            self.run_steps().await
        }
        .instrument(obs::run_span(&run_id))
        .await;

        match &result {
            Ok(outcome) => obs::emit_outcome(outcome),
            Err(err) => obs::emit_run_failed(err),
        }
        result
    }

    async fn run_steps(&self) -> Result<Outcome> {
        let build = self.fetch_build().await?;
        let build = advance!(check_completion(build));
        let build = advance!(check_status(build));
        let eval = self.fetch_eval(&build).await?;
        let current = self.fetch_self_metadata().await?;
        let candidate = self.fetch_target_metadata(&eval).await?;
        let candidate = advance!(compare_freshness(&current, candidate));
        advance!(self.run_health_gate().await);
        let target = self.execute(&candidate).await?;
        self.maybe_reboot(target).await
    }

    pub async fn fetch_build(&self) -> Result<Build> {
        obs::emit_step("fetch_build");
        self.builds.latest_build().await
    }

    pub async fn fetch_eval(&self, build: &Build) -> Result<Evaluation> {
        obs::emit_step("fetch_eval");
        let eval = self.builds.eval(build).await?;
        debug!(eval = eval.id, flake = %eval.flake, "Evaluation");
        Ok(eval)
    }

    pub async fn fetch_self_metadata(&self) -> Result<ArtifactMetadata> {
        obs::emit_step("fetch_self_metadata");
        self.metadata.metadata(&ArtifactRef::CurrentSystem).await
    }

    pub async fn fetch_target_metadata(&self, eval: &Evaluation) -> Result<ArtifactMetadata> {
        obs::emit_step("fetch_target_metadata");
        self.metadata
            .metadata(&ArtifactRef::Flake(eval.flake.clone()))
            .await
    }

    pub async fn run_health_gate(&self) -> Step<()> {
        obs::emit_step("run_health_gate");
        match self.gate.check_all(&self.config.canary_hosts).await {
            Ok(()) => Step::Next(()),
            Err(failure) => Step::Exit(Outcome::CanaryUnhealthy {
                host: failure.host,
                reason: failure.reason,
            }),
        }
    }

    pub async fn execute(&self, candidate: &ArtifactMetadata) -> Result<UpgradeTarget> {
        obs::emit_step("execute");
        let target = UpgradeTarget::resolve(candidate, &self.config.host);
        info!(
            flake = %target,
            operation = %self.config.operation,
            "Performing system upgrade."
        );
        self.executor
            .execute(self.config.operation, &target, &self.config.rebuild_args)
            .await?;
        Ok(target)
    }

    pub async fn maybe_reboot(&self, target: UpgradeTarget) -> Result<Outcome> {
        if !self.config.reboot {
            return Ok(Outcome::Upgraded { target });
        }
        obs::emit_step("reboot");
        info!("Initiating reboot");
        self.executor.reboot().await?;
        Ok(Outcome::RebootTriggered { target })
    }
}

pub fn check_completion(build: Build) -> Step<Build> {
    obs::emit_step("check_completion");
    if build.finished {
        Step::Next(build)
    } else {
        Step::Exit(Outcome::BuildUnfinished { build: build.id })
    }
}

pub fn check_status(build: Build) -> Step<Build> {
    obs::emit_step("check_status");
    if build.succeeded() {
        Step::Next(build)
    } else {
        Step::Exit(Outcome::BuildFailed {
            build: build.id,
            status: build.status,
        })
    }
}

/// Pass the candidate on only when it is strictly newer than `current`.
pub fn compare_freshness(
    current: &ArtifactMetadata,
    candidate: ArtifactMetadata,
) -> Step<ArtifactMetadata> {
    obs::emit_step("compare_freshness");
    debug!(
        current = current.last_modified,
        current_at = ?current.last_modified_at(),
        candidate = candidate.last_modified,
        candidate_at = ?candidate.last_modified_at(),
        candidate_url = %candidate.original_url,
        "Comparing freshness"
    );
    if candidate.is_newer_than(current) {
        Step::Next(candidate)
    } else {
        Step::Exit(Outcome::AlreadyUpToDate {
            current: current.last_modified,
            candidate: candidate.last_modified,
        })
    }
}
