//! Canary health gate.

use tracing::{info, warn};

use crate::traits::{HostProbe, ProbeResult};

/// First canary host that failed its probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanaryFailure {
    pub host: String,
    pub reason: String,
}

/// Probes canary hosts in order and stops at the first failure.
pub struct HealthGate<'a> {
    probe: &'a dyn HostProbe,
}

impl<'a> HealthGate<'a> {
    pub fn new(probe: &'a dyn HostProbe) -> Self {
        Self { probe }
    }

    /// Passes vacuously for an empty list. No host is probed twice and no
    /// host after a failing one is probed at all.
    pub async fn check_all(&self, hosts: &[String]) -> Result<(), CanaryFailure> {
        for host in hosts {
            match self.probe.probe(host).await {
                ProbeResult::Reachable => {
                    info!(host = %host, "Canary healthy");
                }
                ProbeResult::Unreachable(reason) => {
                    warn!(host = %host, reason = %reason, "Canary failed health check");
                    return Err(CanaryFailure {
                        host: host.clone(),
                        reason,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Call, CallLog, FakeProbe};

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_list_passes() {
        let log = CallLog::new();
        let probe = FakeProbe::new(log.clone(), &[]);
        assert!(HealthGate::new(&probe).check_all(&[]).await.is_ok());
        assert!(log.calls().is_empty());
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let log = CallLog::new();
        let probe = FakeProbe::new(log.clone(), &[]);
        let result = HealthGate::new(&probe)
            .check_all(&hosts(&["a", "b", "c"]))
            .await;
        assert!(result.is_ok());
        assert_eq!(log.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let log = CallLog::new();
        let probe = FakeProbe::new(log.clone(), &["b"]);
        let failure = HealthGate::new(&probe)
            .check_all(&hosts(&["a", "b", "c"]))
            .await
            .unwrap_err();

        assert_eq!(failure.host, "b");
        assert_eq!(
            log.calls(),
            vec![
                Call::Probe {
                    host: "a".to_string()
                },
                Call::Probe {
                    host: "b".to_string()
                },
            ]
        );
    }
}
