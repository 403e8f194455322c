//! Wireguard device configuration via `wg set`.
//!
//! Keys are always handed to `wg` through standard input (`/dev/stdin`) so
//! they never show up in a process listing.

use wg_netns_common::NetnsResult;

use crate::command;
use crate::exec::ProcessExecutor;
use crate::link::WireguardLink;

/// Key file argument telling `wg` to read the key from standard input.
const STDIN_KEY: &str = "/dev/stdin";
/// Key file argument clearing the preshared key.
const NO_KEY: &str = "/dev/null";

/// Settings applied to a single peer.
#[derive(Debug, Clone, Copy)]
pub struct PeerConfig<'a> {
    /// Peer public key.
    pub public_key: &'a str,
    /// Preshared key, piped through stdin.
    pub preshared_key: Option<&'a str>,
    /// Keepalive interval in seconds (0 disables it).
    pub persistent_keepalive: u16,
    /// `host:port` of the remote end.
    pub endpoint: Option<&'a str>,
    /// Networks the peer may use as source/destination.
    pub allowed_ips: &'a [String],
}

impl PeerConfig<'_> {
    /// Arguments following `wg set <interface>`.
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "peer".to_string(),
            self.public_key.to_string(),
            "preshared-key".to_string(),
            if self.preshared_key.is_some() { STDIN_KEY } else { NO_KEY }.to_string(),
            "persistent-keepalive".to_string(),
            self.persistent_keepalive.to_string(),
        ];
        if let Some(endpoint) = self.endpoint {
            args.extend(["endpoint".to_string(), endpoint.to_string()]);
        }
        if !self.allowed_ips.is_empty() {
            args.extend(["allowed-ips".to_string(), self.allowed_ips.join(",")]);
        }
        args
    }
}

impl WireguardLink {
    /// Set the UDP listen port (0 lets the kernel pick one).
    ///
    /// # Errors
    ///
    /// Fails if `wg set` fails.
    pub async fn set_listen_port(
        &self,
        executor: &dyn ProcessExecutor,
        port: u16,
    ) -> NetnsResult<()> {
        let port = port.to_string();
        executor
            .execute(&command::wg(
                &self.netns,
                ["set", self.name.as_str(), "listen-port", port.as_str()],
            ))
            .await?;
        Ok(())
    }

    /// Set the firewall mark (0 clears it).
    ///
    /// # Errors
    ///
    /// Fails if `wg set` fails.
    pub async fn set_fwmark(
        &self,
        executor: &dyn ProcessExecutor,
        fwmark: u32,
    ) -> NetnsResult<()> {
        let fwmark = fwmark.to_string();
        executor
            .execute(&command::wg(
                &self.netns,
                ["set", self.name.as_str(), "fwmark", fwmark.as_str()],
            ))
            .await?;
        Ok(())
    }

    /// Set the private key.
    ///
    /// # Errors
    ///
    /// Fails if `wg` rejects the key.
    pub async fn set_private_key(
        &self,
        executor: &dyn ProcessExecutor,
        private_key: &str,
    ) -> NetnsResult<()> {
        executor
            .execute(
                &command::wg(&self.netns, ["set", self.name.as_str(), "private-key", STDIN_KEY])
                    .with_stdin(private_key),
            )
            .await?;
        Ok(())
    }

    /// Add or update a peer.
    ///
    /// # Errors
    ///
    /// Fails if `wg` rejects the peer, for instance a malformed key or an
    /// unresolvable endpoint.
    pub async fn set_peer(
        &self,
        executor: &dyn ProcessExecutor,
        peer: &PeerConfig<'_>,
    ) -> NetnsResult<()> {
        tracing::debug!(interface = %self.name, peer = peer.public_key, "Configuring peer");
        let args = ["set".to_string(), self.name.clone()]
            .into_iter()
            .chain(peer.args());
        let mut invocation = command::wg(&self.netns, args);
        if let Some(preshared_key) = peer.preshared_key {
            invocation = invocation.with_stdin(preshared_key);
        }
        executor.execute(&invocation).await?;
        Ok(())
    }
}
