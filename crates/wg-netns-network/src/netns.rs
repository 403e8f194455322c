//! Network namespace operations.

use serde::Deserialize;

use wg_netns_common::{NetnsError, NetnsResult};

use crate::command;
use crate::exec::ProcessExecutor;

/// Entry of `ip -j netns list`.
#[derive(Debug, Deserialize)]
struct NetnsEntry {
    name: String,
}

/// List the names of all live network namespaces.
///
/// `ip` prints nothing at all when no namespace exists, which yields an empty
/// list rather than a decode error.
///
/// # Errors
///
/// Fails if `ip` fails or prints something other than a JSON namespace list.
pub async fn list_netns(executor: &dyn ProcessExecutor) -> NetnsResult<Vec<String>> {
    let invocation = command::ip(None, ["-j", "netns", "list"]).captured();
    let output = executor.execute(&invocation).await?;
    parse_netns_list(&invocation.command_line(), &output)
}

fn parse_netns_list(command: &str, output: &str) -> NetnsResult<Vec<String>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<NetnsEntry> =
        serde_json::from_str(output).map_err(|e| NetnsError::Execution {
            command: command.to_string(),
            exit_code: Some(0),
            message: format!("unexpected output: {e}"),
        })?;
    Ok(entries.into_iter().map(|entry| entry.name).collect())
}

/// Check if a network namespace exists.
///
/// # Errors
///
/// Fails if the namespaces cannot be listed.
pub async fn netns_exists(executor: &dyn ProcessExecutor, name: &str) -> NetnsResult<bool> {
    let exists = list_netns(executor).await?.iter().any(|ns| ns == name);
    tracing::debug!(namespace = name, exists, "Checked namespace");
    Ok(exists)
}

/// Create a network namespace and bring its loopback interface up.
///
/// # Errors
///
/// Fails if either `ip` command fails.
pub async fn create_netns(executor: &dyn ProcessExecutor, name: &str) -> NetnsResult<()> {
    tracing::debug!(namespace = name, "Creating network namespace");
    executor
        .execute(&command::ip(None, ["netns", "add", name]))
        .await?;
    executor
        .execute(&command::ip(Some(name), ["link", "set", "dev", "lo", "up"]))
        .await?;
    Ok(())
}

/// Delete a network namespace.
///
/// With `check` unset a failing `ip netns delete` is ignored.
///
/// # Errors
///
/// Fails if `ip` cannot be run, or exits non-zero while `check` is set.
pub async fn delete_netns(
    executor: &dyn ProcessExecutor,
    name: &str,
    check: bool,
) -> NetnsResult<()> {
    tracing::debug!(namespace = name, "Deleting network namespace");
    executor
        .execute(&command::ip(None, ["netns", "delete", name]).checked(check))
        .await?;
    Ok(())
}
