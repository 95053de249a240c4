//! HTTP client for a single Hydra job.

use crate::error::HydraError;
use crate::model::{HydraBuild, HydraEval};
use crate::Result;
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinates of the Hydra job to follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydraConfig {
    /// Hydra base URL, e.g. `https://hydra.example.com`
    pub instance: String,
    pub project: String,
    pub jobset: String,
    pub job: String,
    /// Per-request timeout; 0 disables it
    pub timeout_secs: u64,
}

/// Hydra API client
pub struct HydraClient {
    config: HydraConfig,
    base_url: Url,
    http_client: reqwest::Client,
}

impl HydraClient {
    /// Create a new Hydra client
    pub fn new(config: HydraConfig) -> Result<Self> {
        let base_url = parse_instance(&config.instance)?;

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("nixos-hydra-upgrade/", env!("CARGO_PKG_VERSION")));
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let http_client = builder.build()?;

        Ok(HydraClient {
            config,
            base_url,
            http_client,
        })
    }

    /// `/api/latestbuilds` restricted to this job, newest first, one entry.
    pub fn latest_build_url(&self) -> Result<Url> {
        let mut url = self.endpoint("api/latestbuilds")?;
        url.query_pairs_mut()
            .append_pair("nr", "1")
            .append_pair("project", &self.config.project)
            .append_pair("jobset", &self.config.jobset)
            .append_pair("job", &self.config.job);
        Ok(url)
    }

    pub fn eval_url(&self, eval_id: u64) -> Result<Url> {
        self.endpoint(&format!("eval/{}", eval_id))
    }

    /// Fetch the most recent build of the configured job.
    pub async fn latest_build(&self) -> Result<HydraBuild> {
        let url = self.latest_build_url()?;
        let builds: Vec<HydraBuild> = self.get_json(url).await?;

        let build = builds
            .into_iter()
            .next()
            .ok_or_else(|| HydraError::NoBuilds {
                project: self.config.project.clone(),
                jobset: self.config.jobset.clone(),
                job: self.config.job.clone(),
            })?;
        debug!(
            build = build.id,
            finished = build.finished,
            buildstatus = ?build.buildstatus,
            "Latest Hydra build"
        );
        Ok(build)
    }

    /// Fetch the evaluation that produced `build`.
    ///
    /// A build can be shared by several evaluations; the first one Hydra
    /// lists is used.
    pub async fn eval(&self, build: &HydraBuild) -> Result<HydraEval> {
        let eval_id = *build
            .jobsetevals
            .first()
            .ok_or(HydraError::NoEvaluation { build: build.id })?;

        let eval: HydraEval = self.get_json(self.eval_url(eval_id)?).await?;
        debug!(eval = eval.id, flake = %eval.flake, "Hydra evaluation");
        Ok(eval)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| HydraError::InvalidInstance {
                instance: self.config.instance.clone(),
                message: e.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(url = %url, "GET");
        let response = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(HydraError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| HydraError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Parse the instance URL so that relative joins stay under its path.
fn parse_instance(instance: &str) -> Result<Url> {
    let invalid = |message: String| HydraError::InvalidInstance {
        instance: instance.to_string(),
        message,
    };

    let mut url = Url::parse(instance).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(instance: &str) -> HydraConfig {
        HydraConfig {
            instance: instance.to_string(),
            project: "hosts".to_string(),
            jobset: "main".to_string(),
            job: "nixosConfigurations.web1".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_latest_build_url() {
        let client = HydraClient::new(config("https://hydra.example.com")).unwrap();
        assert_eq!(
            client.latest_build_url().unwrap().as_str(),
            "https://hydra.example.com/api/latestbuilds?nr=1&project=hosts&jobset=main&job=nixosConfigurations.web1"
        );
    }

    #[test]
    fn test_instance_with_subpath_and_trailing_slash() {
        let client = HydraClient::new(config("https://ci.example.com/hydra/")).unwrap();
        assert_eq!(
            client.eval_url(7).unwrap().as_str(),
            "https://ci.example.com/hydra/eval/7"
        );

        let client = HydraClient::new(config("https://ci.example.com/hydra")).unwrap();
        assert_eq!(
            client.eval_url(7).unwrap().as_str(),
            "https://ci.example.com/hydra/eval/7"
        );
    }

    #[test]
    fn test_rejects_non_http_instance() {
        assert!(matches!(
            HydraClient::new(config("ftp://hydra.example.com")),
            Err(HydraError::InvalidInstance { .. })
        ));
        assert!(matches!(
            HydraClient::new(config("hydra.example.com")),
            Err(HydraError::InvalidInstance { .. })
        ));
    }
}
