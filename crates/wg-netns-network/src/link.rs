//! Wireguard link management.

use wg_netns_common::NetnsResult;

use crate::command;
use crate::exec::ProcessExecutor;

/// `ip` address family flag for a CIDR or address.
#[must_use]
pub fn family_flag(network: &str) -> &'static str {
    if network.contains(':') { "-6" } else { "-4" }
}

/// A wireguard interface living inside a named network namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireguardLink {
    /// Interface name.
    pub name: String,
    /// Namespace the interface lives in.
    pub netns: String,
}

impl WireguardLink {
    /// Create the interface in `base` (host when `None`) and move it into
    /// `netns`.
    ///
    /// The link is only handed out once the move succeeded, so nothing can be
    /// configured on it while it still sits in the holding namespace.
    ///
    /// # Errors
    ///
    /// Fails if the link cannot be added or moved.
    pub async fn create(
        executor: &dyn ProcessExecutor,
        name: &str,
        base: Option<&str>,
        netns: &str,
    ) -> NetnsResult<Self> {
        tracing::debug!(interface = name, base = ?base, netns, "Creating wireguard link");

        executor
            .execute(&command::ip(base, ["link", "add", name, "type", "wireguard"]))
            .await?;
        executor
            .execute(&command::ip(base, ["link", "set", name, "netns", netns]))
            .await?;

        Ok(Self::existing(name, netns))
    }

    /// Refer to an interface that is expected to exist already.
    #[must_use]
    pub fn existing(name: &str, netns: &str) -> Self {
        Self {
            name: name.to_string(),
            netns: netns.to_string(),
        }
    }

    /// Check if the interface exists.
    ///
    /// A failing query means the interface (or its namespace) is gone.
    pub async fn exists(&self, executor: &dyn ProcessExecutor) -> bool {
        let invocation =
            command::ip(Some(self.netns.as_str()), ["link", "show", self.name.as_str()]).captured();
        let exists = executor.execute(&invocation).await.is_ok();
        tracing::debug!(interface = %self.name, netns = %self.netns, exists, "Checked link");
        exists
    }

    /// Assign an address.
    ///
    /// # Errors
    ///
    /// Fails if `ip address add` fails.
    pub async fn add_address(
        &self,
        executor: &dyn ProcessExecutor,
        address: &str,
    ) -> NetnsResult<()> {
        tracing::debug!(interface = %self.name, address, "Assigning address");
        executor
            .execute(&command::ip(
                Some(self.netns.as_str()),
                [family_flag(address), "address", "add", address, "dev", self.name.as_str()],
            ))
            .await?;
        Ok(())
    }

    /// Set the MTU and bring the interface up.
    ///
    /// # Errors
    ///
    /// Fails if `ip link set` fails.
    pub async fn up(&self, executor: &dyn ProcessExecutor, mtu: u32) -> NetnsResult<()> {
        tracing::debug!(interface = %self.name, mtu, "Bringing link up");
        let mtu = mtu.to_string();
        executor
            .execute(&command::ip(
                Some(self.netns.as_str()),
                ["link", "set", "dev", self.name.as_str(), "mtu", mtu.as_str(), "up"],
            ))
            .await?;
        Ok(())
    }

    /// Route a network through the interface.
    ///
    /// # Errors
    ///
    /// Fails if `ip route add` fails.
    pub async fn add_route(
        &self,
        executor: &dyn ProcessExecutor,
        network: &str,
    ) -> NetnsResult<()> {
        tracing::debug!(interface = %self.name, network, "Adding route");
        executor
            .execute(&command::ip(
                Some(self.netns.as_str()),
                [family_flag(network), "route", "add", network, "dev", self.name.as_str()],
            ))
            .await?;
        Ok(())
    }

    /// Bring the interface down.
    ///
    /// # Errors
    ///
    /// Fails if `ip` cannot be run, or exits non-zero while `check` is set.
    pub async fn down(&self, executor: &dyn ProcessExecutor, check: bool) -> NetnsResult<()> {
        tracing::debug!(interface = %self.name, "Bringing link down");
        executor
            .execute(
                &command::ip(Some(self.netns.as_str()), ["link", "set", self.name.as_str(), "down"])
                    .checked(check),
            )
            .await?;
        Ok(())
    }

    /// Delete the interface.
    ///
    /// # Errors
    ///
    /// Fails if `ip` cannot be run, or exits non-zero while `check` is set.
    pub async fn delete(&self, executor: &dyn ProcessExecutor, check: bool) -> NetnsResult<()> {
        tracing::debug!(interface = %self.name, "Deleting link");
        executor
            .execute(
                &command::ip(Some(self.netns.as_str()), ["link", "delete", self.name.as_str()])
                    .checked(check),
            )
            .await?;
        Ok(())
    }
}
