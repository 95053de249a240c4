//! Configuration sources and merging.
//!
//! Precedence is CLI flag > environment variable > TOML config file. The
//! higher source replaces the whole value; lists are never merged.

use anyhow::{Context, Result};
use clap::Parser;
use hydra_upgrade_core::{HydraCoordinates, RebuildOperation, RunConfig, Timeouts};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ABOUT: &str = "nixos-hydra-upgrade performs NixOS system upgrades based on hydra build success";

const LONG_ABOUT: &str = "\
A NixOS flake system upgrader that upgrades to derivations only after they are \
successfully built in Hydra, and built in validations pass.

Most config may be specified using CLI flags, a TOML config file, or environment \
variables. Multivalue settings are a TOML array, a comma delimited environment \
variable, or a comma delimited / repeated CLI flag.

Config follows the precedence CLI flag > environment variable > TOML config, with \
the higher priority source replacing the entire value.

  boot   - prepare a system to be upgraded on reboot
  switch - upgrade a system in place";

#[derive(Parser, Debug, Default)]
#[command(name = "nixos-hydra-upgrade")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = ABOUT, long_about = LONG_ABOUT)]
pub struct Cli {
    /// nixos-rebuild operation [default: boot]
    #[arg(value_name = "boot|switch", env = "NIXOS_HYDRA_UPGRADE_NIXOS_REBUILD_OPERATION")]
    pub operation: Option<RebuildOperation>,

    /// Config file (TOML)
    #[arg(short, long, env = "NIXOS_HYDRA_UPGRADE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging [default: false]
    #[arg(
        short,
        long,
        env = "NIXOS_HYDRA_UPGRADE_DEBUG",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub debug: Option<bool>,

    /// Emit JSON-formatted log lines
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_JSON")]
    pub json: bool,

    /// Hydra instance URL (required)
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_HYDRA_INSTANCE")]
    pub hydra_instance: Option<String>,

    /// Hydra project (required)
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_HYDRA_PROJECT")]
    pub hydra_project: Option<String>,

    /// Hydra jobset (required)
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_HYDRA_JOBSET")]
    pub hydra_jobset: Option<String>,

    /// Hydra job (required)
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_HYDRA_JOB")]
    pub hydra_job: Option<String>,

    /// Multivalue - canary systems, only upgrade if these hostnames respond to ping
    #[arg(long, value_delimiter = ',', env = "NIXOS_HYDRA_UPGRADE_HEALTHCHECK_CANARY_HOSTS")]
    pub canary_hosts: Option<Vec<String>>,

    /// Flake `nixosConfigurations.<name>`, usually hostname (required)
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_NIXOS_REBUILD_HOST")]
    pub host: Option<String>,

    /// Multivalue - additional args to provide to nixos-rebuild
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        env = "NIXOS_HYDRA_UPGRADE_NIXOS_REBUILD_ARGS"
    )]
    pub rebuild_args: Option<Vec<String>>,

    /// Reboot system on successful upgrade [default: false]
    #[arg(
        long,
        env = "NIXOS_HYDRA_UPGRADE_REBOOT",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub reboot: Option<bool>,

    /// Timeout for Hydra API requests in seconds (0 disables) [default: 30]
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_TIMEOUTS_HTTP_SECS")]
    pub http_timeout_secs: Option<u64>,

    /// Timeout for nix, nixos-rebuild and ping in seconds (0 disables) [default: 3600]
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_TIMEOUTS_COMMAND_SECS")]
    pub command_timeout_secs: Option<u64>,

    /// Seconds to wait for a ping reply from each canary [default: 5]
    #[arg(long, env = "NIXOS_HYDRA_UPGRADE_TIMEOUTS_PROBE_SECS")]
    pub probe_timeout_secs: Option<u64>,
}

/// On-disk configuration. Every key is optional here; required keys are
/// enforced after merging.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub debug: Option<bool>,
    pub reboot: Option<bool>,
    pub hydra: FileHydra,
    pub healthcheck: FileHealthcheck,
    pub nixos_rebuild: FileNixosRebuild,
    pub timeouts: FileTimeouts,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileHydra {
    pub instance: Option<String>,
    pub project: Option<String>,
    pub jobset: Option<String>,
    pub job: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileHealthcheck {
    pub canary_hosts: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileNixosRebuild {
    pub host: Option<String>,
    pub operation: Option<RebuildOperation>,
    pub args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileTimeouts {
    pub http_secs: Option<u64>,
    pub command_secs: Option<u64>,
    pub probe_secs: Option<u64>,
}

pub fn load_file(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

/// Merge flag/env values over file values.
pub fn merge(cli: &Cli, file: FileConfig) -> RunConfig {
    let defaults = Timeouts::default();
    RunConfig {
        hydra: HydraCoordinates {
            instance: pick(&cli.hydra_instance, file.hydra.instance).unwrap_or_default(),
            project: pick(&cli.hydra_project, file.hydra.project).unwrap_or_default(),
            jobset: pick(&cli.hydra_jobset, file.hydra.jobset).unwrap_or_default(),
            job: pick(&cli.hydra_job, file.hydra.job).unwrap_or_default(),
        },
        canary_hosts: pick(&cli.canary_hosts, file.healthcheck.canary_hosts).unwrap_or_default(),
        host: pick(&cli.host, file.nixos_rebuild.host).unwrap_or_default(),
        operation: pick(&cli.operation, file.nixos_rebuild.operation).unwrap_or_default(),
        rebuild_args: pick(&cli.rebuild_args, file.nixos_rebuild.args).unwrap_or_default(),
        reboot: pick(&cli.reboot, file.reboot).unwrap_or(false),
        debug: pick(&cli.debug, file.debug).unwrap_or(false),
        timeouts: Timeouts {
            http_secs: pick(&cli.http_timeout_secs, file.timeouts.http_secs)
                .unwrap_or(defaults.http_secs),
            command_secs: pick(&cli.command_timeout_secs, file.timeouts.command_secs)
                .unwrap_or(defaults.command_secs),
            probe_secs: pick(&cli.probe_timeout_secs, file.timeouts.probe_secs)
                .unwrap_or(defaults.probe_secs),
        },
    }
}

/// Load the config file (if any), merge, and validate.
pub fn load(cli: &Cli) -> Result<RunConfig> {
    let file = match &cli.config {
        Some(path) => load_file(path)?,
        None => FileConfig::default(),
    };
    let config = merge(cli, file);
    config.validate()?;
    Ok(config)
}

fn pick<T: Clone>(higher: &Option<T>, lower: Option<T>) -> Option<T> {
    higher.clone().or(lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FILE: &str = r#"
        debug = true

        [hydra]
        instance = "https://hydra.example.com"
        project = "hosts"
        jobset = "main"
        job = "nixosConfigurations.web1"

        [healthcheck]
        canary_hosts = ["canary1", "canary2"]

        [nixos_rebuild]
        host = "web1"
        operation = "switch"
        args = ["--option", "fallback", "true"]

        [timeouts]
        command_secs = 600
    "#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_only() {
        let file = write_config(FILE);
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };

        let config = load(&cli).unwrap();
        assert_eq!(config.hydra.instance, "https://hydra.example.com");
        assert_eq!(config.hydra.job, "nixosConfigurations.web1");
        assert_eq!(config.canary_hosts, vec!["canary1", "canary2"]);
        assert_eq!(config.operation, RebuildOperation::Switch);
        assert_eq!(config.rebuild_args, vec!["--option", "fallback", "true"]);
        assert!(config.debug);
        assert!(!config.reboot);
        assert_eq!(config.timeouts.command_secs, 600);
        assert_eq!(config.timeouts.http_secs, 30);
    }

    #[test]
    fn test_cli_replaces_whole_list() {
        let file = write_config(FILE);
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            canary_hosts: Some(vec!["canary9".to_string()]),
            operation: Some(RebuildOperation::Boot),
            reboot: Some(true),
            ..Cli::default()
        };

        let config = load(&cli).unwrap();
        assert_eq!(config.canary_hosts, vec!["canary9"]);
        assert_eq!(config.operation, RebuildOperation::Boot);
        assert!(config.reboot);
    }

    #[test]
    fn test_parses_flags() {
        let cli = Cli::try_parse_from([
            "nixos-hydra-upgrade",
            "switch",
            "--hydra-instance",
            "https://hydra.example.com",
            "--hydra-project",
            "hosts",
            "--hydra-jobset",
            "main",
            "--hydra-job",
            "nixosConfigurations.web1",
            "--host",
            "web1",
            "--canary-hosts",
            "a,b",
            "--canary-hosts",
            "c",
            "--rebuild-args",
            "--impure,--refresh",
            "--reboot",
        ])
        .unwrap();

        let config = load(&cli).unwrap();
        assert_eq!(config.operation, RebuildOperation::Switch);
        assert_eq!(config.canary_hosts, vec!["a", "b", "c"]);
        assert_eq!(config.rebuild_args, vec!["--impure", "--refresh"]);
        assert!(config.reboot);
    }

    #[test]
    fn test_flag_false_overrides_file_true() {
        let file = write_config("reboot = true\ndebug = true\n");
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from([
            "nixos-hydra-upgrade",
            "--config",
            path.as_str(),
            "--reboot=false",
            "-d=false",
        ])
        .unwrap();
        assert_eq!(cli.reboot, Some(false));

        let config = merge(&cli, load_file(file.path()).unwrap());
        assert!(!config.reboot);
        assert!(!config.debug);
    }

    #[test]
    fn test_env_false_overrides_file_true() {
        let file = write_config("reboot = true\n");
        std::env::set_var("NIXOS_HYDRA_UPGRADE_REBOOT", "false");
        let cli = Cli::try_parse_from(["nixos-hydra-upgrade"]);
        std::env::remove_var("NIXOS_HYDRA_UPGRADE_REBOOT");

        let cli = cli.unwrap();
        assert_eq!(cli.reboot, Some(false));
        let config = merge(&cli, load_file(file.path()).unwrap());
        assert!(!config.reboot);
    }

    #[test]
    fn test_bare_switch_means_true() {
        let cli = Cli::try_parse_from(["nixos-hydra-upgrade", "--reboot", "switch"]).unwrap();
        assert_eq!(cli.reboot, Some(true));
        assert_eq!(cli.operation, Some(RebuildOperation::Switch));

        let config = merge(&cli, FileConfig::default());
        assert!(config.reboot);
        assert!(!config.debug);
    }

    #[test]
    fn test_canary_host_with_leading_dash_is_rejected() {
        let file = write_config(FILE);
        let path = file.path().to_str().unwrap().to_string();
        let cli = Cli::try_parse_from([
            "nixos-hydra-upgrade",
            "--config",
            path.as_str(),
            "--canary-hosts=-f",
        ])
        .unwrap();
        let msg = format!("{:#}", load(&cli).unwrap_err());
        assert!(msg.contains("healthcheck.canary_hosts"));
    }

    #[test]
    fn test_rejects_unknown_operation() {
        assert!(Cli::try_parse_from(["nixos-hydra-upgrade", "test"]).is_err());
    }

    #[test]
    fn test_missing_required_values() {
        let err = load(&Cli::default()).unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("hydra.instance"));
        assert!(msg.contains("nixos_rebuild.host"));
    }

    #[test]
    fn test_unknown_file_key_is_rejected() {
        let file = write_config("[hydra]\ninstnace = \"https://hydra.example.com\"\n");
        let cli = Cli {
            config: Some(file.path().to_path_buf()),
            ..Cli::default()
        };
        let msg = format!("{:#}", load(&cli).unwrap_err());
        assert!(msg.contains("Failed to parse config file"));
    }

    #[test]
    fn test_missing_file() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/nixos-hydra-upgrade.toml")),
            ..Cli::default()
        };
        let msg = format!("{:#}", load(&cli).unwrap_err());
        assert!(msg.contains("Failed to read config file"));
    }
}
