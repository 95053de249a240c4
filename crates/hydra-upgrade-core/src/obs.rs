//! Structured events for the upgrade run lifecycle.
//!
//! Every run is wrapped in an `upgrade.run` span tagged with a fresh run id.
//! Event names: `run.started`, `upgrade.step`, `upgrade.outcome`,
//! `upgrade.failed`.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use crate::domain::{RunConfig, UpgradeError};
use crate::orchestrator::Outcome;

/// Create the span for one run. Pair with `tracing::Instrument`.
pub fn run_span(run_id: &Uuid) -> Span {
    tracing::info_span!("upgrade.run", run_id = %run_id)
}

pub fn emit_run_started(config: &RunConfig) {
    info!(
        event = "run.started",
        instance = %config.hydra.instance,
        project = %config.hydra.project,
        jobset = %config.hydra.jobset,
        job = %config.hydra.job,
        host = %config.host,
        operation = %config.operation,
        canaries = config.canary_hosts.len(),
        reboot = config.reboot,
    );
}

/// Emit event: the pipeline entered `step`.
pub fn emit_step(step: &str) {
    tracing::debug!(event = "upgrade.step", step = %step);
}

/// Emit event: run ended with a terminal outcome.
pub fn emit_outcome(outcome: &Outcome) {
    if outcome.is_success() {
        info!(event = "upgrade.outcome", outcome = outcome.name(), "{}", outcome);
    } else {
        warn!(event = "upgrade.outcome", outcome = outcome.name(), "{}", outcome);
    }
}

/// Emit event: run aborted by an external-call failure.
pub fn emit_run_failed(err: &UpgradeError) {
    error!(event = "upgrade.failed", kind = err.kind(), error = %err);
}
