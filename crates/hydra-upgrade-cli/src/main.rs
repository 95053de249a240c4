//! nixos-hydra-upgrade
//!
//! Upgrades a NixOS flake system to the configuration its Hydra job last
//! built, once the build succeeded, the build is newer than the running
//! system, and every canary host answers a ping.
//!
//! Exit status is 0 for a completed upgrade or a benign early exit, 1 for a
//! failed build, an unhealthy canary, a config error or any failed external
//! call.

mod config;

use clap::Parser;
use hydra_upgrade_core::{
    init_tracing, obs, HydraBuildSource, LogFormat, NixMetadataProvider, NixosRebuildExecutor,
    Orchestrator, PingProbe, SystemCommandRunner, EXIT_FAILURE,
};
use std::process::ExitCode;
use tracing::debug;

use config::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let format = if cli.json {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, config.debug);
    debug!(config = ?config, "Loaded config");

    let builds = match HydraBuildSource::new(&config) {
        Ok(builds) => builds,
        Err(e) => {
            obs::emit_run_failed(&e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };
    let runner = SystemCommandRunner::new(config.timeouts.command_secs);
    let metadata = NixMetadataProvider::new(runner.clone());
    let probe = PingProbe::new(runner.clone(), config.timeouts.probe_secs);
    let executor = NixosRebuildExecutor::new(runner);

    let orchestrator = Orchestrator::new(&config, &builds, &metadata, &probe, &executor);
    match orchestrator.run().await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(_) => ExitCode::from(EXIT_FAILURE),
    }
}
