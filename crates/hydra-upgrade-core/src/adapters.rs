//! Production implementations of the pipeline traits.
//!
//! Hydra is reached over HTTP through `hydra-client`; everything else shells
//! out through a `nix_env_manager::CommandRunner`.

use async_trait::async_trait;
use hydra_client::{HydraBuild, HydraClient, HydraConfig, HydraError};
use nix_env_manager::{CommandRunner, RebuildOperation};
use tracing::warn;

use crate::domain::{
    ArtifactMetadata, ArtifactRef, Build, Evaluation, Result, RunConfig, UpgradeError,
    UpgradeTarget,
};
use crate::traits::{BuildStatusSource, HostProbe, MetadataProvider, ProbeResult, UpgradeExecutor};

/// [`BuildStatusSource`] backed by the Hydra JSON API.
pub struct HydraBuildSource {
    client: HydraClient,
    timeout_secs: u64,
}

impl HydraBuildSource {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = HydraClient::new(HydraConfig {
            instance: config.hydra.instance.clone(),
            project: config.hydra.project.clone(),
            jobset: config.hydra.jobset.clone(),
            job: config.hydra.job.clone(),
            timeout_secs: config.timeouts.http_secs,
        })?;
        Ok(Self {
            client,
            timeout_secs: config.timeouts.http_secs,
        })
    }

    /// Request timeouts surface as [`UpgradeError::Timeout`], not as network errors.
    fn classify(&self, err: HydraError) -> UpgradeError {
        if let HydraError::Http(e) = &err {
            if e.is_timeout() {
                return UpgradeError::Timeout {
                    command: e
                        .url()
                        .map(|u| format!("GET {}", u))
                        .unwrap_or_else(|| "hydra request".to_string()),
                    secs: self.timeout_secs,
                };
            }
        }
        err.into()
    }
}

#[async_trait]
impl BuildStatusSource for HydraBuildSource {
    async fn latest_build(&self) -> Result<Build> {
        let build = self.client.latest_build().await.map_err(|e| self.classify(e))?;
        Ok(build.into())
    }

    async fn eval(&self, build: &Build) -> Result<Evaluation> {
        let wire = HydraBuild::from(build);
        let eval = self.client.eval(&wire).await.map_err(|e| self.classify(e))?;
        Ok(eval.into())
    }
}

/// [`MetadataProvider`] that runs `nix flake metadata`.
pub struct NixMetadataProvider<R> {
    runner: R,
}

impl<R: CommandRunner> NixMetadataProvider<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl<R: CommandRunner> MetadataProvider for NixMetadataProvider<R> {
    async fn metadata(&self, artifact: &ArtifactRef) -> Result<ArtifactMetadata> {
        let metadata = nix_env_manager::get_flake_metadata(&self.runner, artifact.as_str()).await?;
        Ok(metadata.into())
    }
}

/// [`HostProbe`] that sends a single ICMP echo with the system `ping`.
pub struct PingProbe<R> {
    runner: R,
    wait_secs: u64,
}

impl<R: CommandRunner> PingProbe<R> {
    pub fn new(runner: R, wait_secs: u64) -> Self {
        Self { runner, wait_secs }
    }
}

#[async_trait]
impl<R: CommandRunner> HostProbe for PingProbe<R> {
    async fn probe(&self, host: &str) -> ProbeResult {
        match nix_env_manager::ping(&self.runner, host, self.wait_secs).await {
            Ok(()) => ProbeResult::Reachable,
            Err(e) => {
                warn!(host = %host, error = %e, "Ping failed");
                ProbeResult::Unreachable(e.to_string())
            }
        }
    }
}

/// [`UpgradeExecutor`] that runs `nixos-rebuild` and `systemctl reboot`.
pub struct NixosRebuildExecutor<R> {
    runner: R,
}

impl<R: CommandRunner> NixosRebuildExecutor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl<R: CommandRunner> UpgradeExecutor for NixosRebuildExecutor<R> {
    async fn execute(
        &self,
        operation: RebuildOperation,
        target: &UpgradeTarget,
        extra_args: &[String],
    ) -> Result<()> {
        nix_env_manager::nixos_rebuild(&self.runner, operation, &target.flake_ref(), extra_args)
            .await?;
        Ok(())
    }

    async fn reboot(&self) -> Result<()> {
        nix_env_manager::reboot(&self.runner).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix_env_manager::{CommandOutput, CommandSpec, NixError};
    use std::sync::{Arc, Mutex};

    /// Replays one canned output and records the command line.
    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<CommandSpec>>>,
        exit_code: i32,
        stdout: String,
    }

    #[async_trait]
    impl CommandRunner for Recorder {
        async fn run(&self, spec: &CommandSpec) -> std::result::Result<CommandOutput, NixError> {
            self.calls.lock().unwrap().push(spec.clone());
            Ok(CommandOutput {
                program: spec.program.clone(),
                exit_code: self.exit_code,
                stdout: self.stdout.clone().into_bytes(),
                stderr: if self.exit_code == 0 {
                    String::new()
                } else {
                    "error: unreachable".to_string()
                },
                duration_ms: 1,
                success: self.exit_code == 0,
            })
        }
    }

    fn recorder(exit_code: i32, stdout: &str) -> Recorder {
        Recorder {
            exit_code,
            stdout: stdout.to_string(),
            ..Recorder::default()
        }
    }

    #[tokio::test]
    async fn test_metadata_for_current_system() {
        let runner = recorder(0, r#"{"lastModified": 1700000000, "originalUrl": "github:acme/hosts"}"#);
        let provider = NixMetadataProvider::new(runner.clone());

        let metadata = provider.metadata(&ArtifactRef::CurrentSystem).await.unwrap();
        assert_eq!(metadata, ArtifactMetadata::new(1700000000, "github:acme/hosts"));
        assert_eq!(
            runner.calls.lock().unwrap()[0].args,
            vec!["flake", "metadata", "self", "--json"]
        );
    }

    #[tokio::test]
    async fn test_metadata_failure_is_execution_error() {
        let provider = NixMetadataProvider::new(recorder(1, ""));
        let err = provider
            .metadata(&ArtifactRef::Flake("github:acme/hosts/abc".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, UpgradeError::Execution { exit_code: 1, .. }));
    }

    #[tokio::test]
    async fn test_ping_probe() {
        let reachable = PingProbe::new(recorder(0, ""), 2);
        assert_eq!(reachable.probe("canary1").await, ProbeResult::Reachable);

        let unreachable = PingProbe::new(recorder(1, ""), 2);
        assert!(matches!(
            unreachable.probe("canary1").await,
            ProbeResult::Unreachable(_)
        ));
    }

    #[tokio::test]
    async fn test_executor_builds_flake_ref() {
        let runner = recorder(0, "");
        let executor = NixosRebuildExecutor::new(runner.clone());
        let target = UpgradeTarget::resolve(&ArtifactMetadata::new(2, "github:acme/hosts"), "web1");

        executor
            .execute(RebuildOperation::Switch, &target, &["--fast".to_string()])
            .await
            .unwrap();
        executor.reboot().await.unwrap();

        let calls = runner.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            CommandSpec::new(
                "nixos-rebuild",
                ["switch", "--flake", "github:acme/hosts#web1", "--fast"]
            )
        );
        assert_eq!(calls[1], CommandSpec::new("systemctl", ["reboot"]));
    }

    #[test]
    fn test_hydra_source_rejects_bad_instance() {
        let config = RunConfig {
            hydra: crate::domain::HydraCoordinates {
                instance: "not a url".to_string(),
                ..Default::default()
            },
            ..RunConfig::default()
        };
        assert!(matches!(
            HydraBuildSource::new(&config),
            Err(UpgradeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_hydra_request_timeout_is_timeout_error() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = RunConfig::default();
        config.hydra = crate::domain::HydraCoordinates {
            instance: format!("http://{}", addr),
            project: "hosts".to_string(),
            jobset: "main".to_string(),
            job: "nixosConfigurations.web1".to_string(),
        };
        config.timeouts.http_secs = 1;

        let source = HydraBuildSource::new(&config).unwrap();
        match source.latest_build().await.unwrap_err() {
            UpgradeError::Timeout { command, secs } => {
                assert!(command.starts_with("GET "));
                assert_eq!(secs, 1);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
