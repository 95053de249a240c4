//! Nix-Env-Manager: Nix and host tooling for nixos-hydra-upgrade
//!
//! Everything here shells out. The [`CommandRunner`] trait is the single
//! seam between this crate and real processes, so callers can substitute a
//! scripted runner in tests.
//!
//! - [`get_flake_metadata`]: `nix flake metadata <ref> --json`
//! - [`nixos_rebuild`]: `nixos-rebuild <boot|switch> --flake <ref>`
//! - [`reboot`]: `systemctl reboot`
//! - [`ping`]: single ICMP echo against a host

pub mod command;
pub mod error;
pub mod flake;
pub mod probe;
pub mod rebuild;

pub use command::{CommandOutput, CommandRunner, CommandSpec, SystemCommandRunner};
pub use error::NixError;
pub use flake::{get_flake_metadata, FlakeMetadata, CURRENT_SYSTEM_FLAKE};
pub use probe::ping;
pub use rebuild::{nixos_rebuild, reboot, RebuildOperation};

/// Result type for nix-env-manager operations
pub type Result<T> = std::result::Result<T, NixError>;

