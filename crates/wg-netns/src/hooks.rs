//! Lifecycle hook execution.
//!
//! Each hook item is handed to the configured shell as `-c <command>`, either
//! inside the target namespace (`ip netns exec`) or on the host.

use std::path::Path;

use wg_netns_common::NetnsResult;
use wg_netns_network::{ProcessExecutor, command};

use crate::profile::{Hook, HookPoint};

/// Run every item of `hook` in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the error of the first failing item.
pub async fn run_hook(
    executor: &dyn ProcessExecutor,
    shell: &Path,
    netns: &str,
    point: HookPoint,
    hook: &Hook,
) -> NetnsResult<()> {
    for (index, item) in hook.items.iter().enumerate() {
        tracing::info!(
            hook = %point,
            item = index,
            host = item.host_namespace,
            command = %item.command,
            "Running hook"
        );
        let invocation = if item.host_namespace {
            command::host_eval(shell, &item.command)
        } else {
            command::netns_eval(shell, netns, &item.command)
        };
        executor.execute(&invocation).await?;
    }
    Ok(())
}
