//! Command builders for `ip`, `wg` and shells.
//!
//! Namespace-scoped commands are expressed through iproute2: `ip -n <ns>` for
//! link/address/route changes and `ip netns exec <ns>` for everything else.

use std::path::Path;

use crate::exec::Invocation;

/// `ip [-n <netns>] <args>`.
pub fn ip<I, S>(netns: Option<&str>, args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let scope = netns.into_iter().flat_map(|name| ["-n".to_string(), name.to_string()]);
    Invocation::new("ip", scope.chain(args.into_iter().map(Into::into)))
}

/// `ip netns exec <netns> <args>`.
pub fn netns_exec<I, S>(netns: &str, args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let prefix = ["netns".to_string(), "exec".to_string(), netns.to_string()];
    ip(None, prefix.into_iter().chain(args.into_iter().map(Into::into)))
}

/// `wg <args>` run inside `netns`.
pub fn wg<I, S>(netns: &str, args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args = std::iter::once("wg".to_string()).chain(args.into_iter().map(Into::into));
    netns_exec(netns, args)
}

/// `<shell> -c <script>` run inside `netns`.
pub fn netns_eval(shell: &Path, netns: &str, script: &str) -> Invocation {
    netns_exec(
        netns,
        [shell.display().to_string(), "-c".to_string(), script.to_string()],
    )
}

/// `<shell> -c <script>` run on the host.
pub fn host_eval(shell: &Path, script: &str) -> Invocation {
    Invocation::new(shell.display().to_string(), ["-c", script])
}
