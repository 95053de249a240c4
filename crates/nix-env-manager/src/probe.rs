//! Host reachability via the system `ping` binary.

use crate::command::{CommandRunner, CommandSpec};
use crate::Result;

/// Send one ICMP echo to `host`, waiting at most `wait_secs` for the reply.
///
/// Returns `Ok(())` when the host answered and
/// [`NixError::CommandFailed`](crate::NixError::CommandFailed) when it did not.
pub async fn ping(runner: &dyn CommandRunner, host: &str, wait_secs: u64) -> Result<()> {
    let wait = wait_secs.max(1).to_string();
    runner
        .run(&CommandSpec::new("ping", ["-c", "1", "-W", wait.as_str(), host]))
        .await?
        .ensure_success()?;
    Ok(())
}
