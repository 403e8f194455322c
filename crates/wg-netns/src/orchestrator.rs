//! Namespace provisioning.
//!
//! [`Orchestrator`] turns a [`Namespace`] into a sequence of `ip`, `wg` and
//! hook invocations. Setup runs strictly in order and aborts on the first
//! failure; [`Orchestrator::up`] then rolls back with a best-effort teardown.

use std::fmt;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;
use wg_netns_common::{NetnsError, NetnsResult, Settings};
use wg_netns_network::{
    PeerConfig, ProcessExecutor, WireguardLink, create_netns, delete_netns, netns_exists,
};

use crate::hooks::run_hook;
use crate::profile::{HookPoint, Interface, Namespace, Peer};

/// Provisioning progress of a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    /// Nothing has been done yet.
    Unconfigured,
    /// Namespace exists and the pre-up hook may run.
    NamespaceReady,
    /// Every interface is configured and up.
    InterfacesReady,
    /// Post-up hook completed.
    Up,
    /// Interfaces have been removed.
    InterfacesTorn,
    /// Managed namespace has been deleted.
    NamespaceGone,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unconfigured => write!(f, "unconfigured"),
            Self::NamespaceReady => write!(f, "namespace-ready"),
            Self::InterfacesReady => write!(f, "interfaces-ready"),
            Self::Up => write!(f, "up"),
            Self::InterfacesTorn => write!(f, "interfaces-torn"),
            Self::NamespaceGone => write!(f, "namespace-gone"),
        }
    }
}

/// Failures swallowed by a best-effort teardown.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Errors in the order they happened.
    pub errors: Vec<NetnsError>,
}

impl TeardownReport {
    /// No step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Applies and removes namespace profiles.
pub struct Orchestrator<'a> {
    executor: &'a dyn ProcessExecutor,
    settings: &'a Settings,
    state: Mutex<ProvisionState>,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator running commands through `executor`.
    pub fn new(executor: &'a dyn ProcessExecutor, settings: &'a Settings) -> Self {
        Self {
            executor,
            settings,
            state: Mutex::new(ProvisionState::Unconfigured),
        }
    }

    /// Last state reached.
    pub fn state(&self) -> ProvisionState {
        *self.state.lock()
    }

    fn transition(&self, namespace: &Namespace, state: ProvisionState) {
        *self.state.lock() = state;
        tracing::info!(namespace = %namespace.name, state = %state, "Namespace state changed");
    }

    /// Set up the namespace, rolling back if setup fails or `interrupt`
    /// resolves first.
    ///
    /// `interrupt` is dropped before the rollback starts; the rollback itself
    /// cannot be cancelled.
    ///
    /// # Errors
    ///
    /// Returns the setup error (or [`NetnsError::Interrupted`]) after the
    /// rollback finished.
    pub async fn up<F>(&self, namespace: &Namespace, interrupt: F) -> NetnsResult<()>
    where
        F: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            biased;
            () = interrupt => Err(NetnsError::Interrupted),
            result = self.setup(namespace) => result,
        };

        if let Err(err) = outcome {
            tracing::error!(namespace = %namespace.name, error = %err, "Setup failed, rolling back");
            let report = self.rollback(namespace).await;
            if !report.is_clean() {
                tracing::warn!(
                    namespace = %namespace.name,
                    failures = report.errors.len(),
                    "Rollback left residue behind"
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Tear the namespace down.
    ///
    /// `force` continues past failures instead of aborting.
    ///
    /// # Errors
    ///
    /// Without `force`, returns the first teardown failure.
    pub async fn down(&self, namespace: &Namespace, force: bool) -> NetnsResult<TeardownReport> {
        self.teardown(namespace, !force).await
    }

    /// Create the namespace, run hooks and configure every interface.
    ///
    /// Stops at the first failure without cleaning up.
    ///
    /// # Errors
    ///
    /// Returns [`NetnsError::NamespaceExists`] when a managed namespace is
    /// already present, or the first failing step's error.
    pub async fn setup(&self, namespace: &Namespace) -> NetnsResult<()> {
        tracing::info!(
            namespace = %namespace.name,
            managed = namespace.managed,
            interfaces = namespace.interfaces.len(),
            "Setting up namespace"
        );

        if namespace.managed {
            if netns_exists(self.executor, &namespace.name).await? {
                return Err(NetnsError::NamespaceExists {
                    name: namespace.name.clone(),
                });
            }
            create_netns(self.executor, &namespace.name).await?;
        }
        self.transition(namespace, ProvisionState::NamespaceReady);

        self.run_hook(namespace, HookPoint::PreUp).await?;
        self.write_resolv_conf(namespace)?;

        for interface in &namespace.interfaces {
            self.setup_interface(namespace, interface).await?;
        }
        self.transition(namespace, ProvisionState::InterfacesReady);

        self.run_hook(namespace, HookPoint::PostUp).await?;
        self.transition(namespace, ProvisionState::Up);
        Ok(())
    }

    async fn setup_interface(&self, namespace: &Namespace, interface: &Interface) -> NetnsResult<()> {
        tracing::info!(
            namespace = %namespace.name,
            interface = %interface.name,
            peers = interface.peers.len(),
            "Setting up interface"
        );

        let link = WireguardLink::create(
            self.executor,
            &interface.name,
            interface.base_netns.as_deref(),
            &namespace.name,
        )
        .await?;

        link.set_listen_port(self.executor, interface.listen_port).await?;
        link.set_fwmark(self.executor, interface.fwmark).await?;
        if let Some(private_key) = &interface.private_key {
            link.set_private_key(self.executor, private_key.expose()).await?;
        }
        for peer in &interface.peers {
            link.set_peer(self.executor, &peer_config(peer)).await?;
        }

        for address in &interface.address {
            link.add_address(self.executor, address).await?;
        }
        link.up(self.executor, interface.mtu).await?;

        for peer in &interface.peers {
            for network in peer.route_networks() {
                link.add_route(self.executor, network).await?;
            }
        }
        Ok(())
    }

    /// Remove interfaces and, for managed namespaces, the namespace itself.
    ///
    /// With `check` set the first failure aborts. Otherwise every failure is
    /// logged, collected in the report, and teardown carries on.
    ///
    /// # Errors
    ///
    /// Only with `check` set.
    pub async fn teardown(&self, namespace: &Namespace, check: bool) -> NetnsResult<TeardownReport> {
        tracing::info!(namespace = %namespace.name, check, "Tearing down namespace");
        let mut steps = Steps::new(check);

        let result = self.run_hook(namespace, HookPoint::PreDown).await;
        steps.record("pre-down hook", result)?;

        for interface in &namespace.interfaces {
            let link = WireguardLink::existing(&interface.name, &namespace.name);
            if !link.exists(self.executor).await {
                tracing::debug!(interface = %interface.name, "Interface not present, skipping");
                continue;
            }
            let result = link.down(self.executor, check).await;
            steps.record("interface down", result)?;
            let result = link.delete(self.executor, check).await;
            steps.record("interface delete", result)?;
        }
        self.transition(namespace, ProvisionState::InterfacesTorn);

        let result = self.run_hook(namespace, HookPoint::PostDown).await;
        steps.record("post-down hook", result)?;

        if namespace.managed {
            match netns_exists(self.executor, &namespace.name).await {
                Ok(true) => {
                    let result = delete_netns(self.executor, &namespace.name, check).await;
                    steps.record("namespace delete", result)?;
                    steps.record("resolv.conf removal", self.remove_resolv_conf(namespace))?;
                }
                Ok(false) => {
                    tracing::debug!(namespace = %namespace.name, "Namespace not present, skipping");
                }
                Err(err) => steps.record("namespace lookup", Err(err))?,
            }
            self.transition(namespace, ProvisionState::NamespaceGone);
        }

        self.transition(namespace, ProvisionState::Unconfigured);
        Ok(steps.report)
    }

    /// Best-effort teardown after a failed setup.
    pub async fn rollback(&self, namespace: &Namespace) -> TeardownReport {
        match self.teardown(namespace, false).await {
            Ok(report) => report,
            Err(err) => TeardownReport { errors: vec![err] },
        }
    }

    async fn run_hook(&self, namespace: &Namespace, point: HookPoint) -> NetnsResult<()> {
        match namespace.hooks.get(point) {
            Some(hook) => {
                run_hook(self.executor, &self.settings.shell, &namespace.name, point, hook).await
            }
            None => Ok(()),
        }
    }

    /// Write `<netns_dir>/<name>/resolv.conf` when DNS servers are configured.
    ///
    /// Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`NetnsError::Io`] if the file cannot be written.
    pub fn write_resolv_conf(&self, namespace: &Namespace) -> NetnsResult<Option<PathBuf>> {
        if namespace.dns_server.is_empty() {
            return Ok(None);
        }

        let path = self.settings.paths.resolv_conf(&namespace.name);
        let dir = self.settings.paths.netns_config_dir(&namespace.name);
        std::fs::create_dir_all(&dir).map_err(|e| NetnsError::io(&dir, e))?;

        let content: String = namespace
            .dns_server
            .iter()
            .map(|server| format!("nameserver {server}\n"))
            .collect();
        std::fs::write(&path, content).map_err(|e| NetnsError::io(&path, e))?;

        tracing::debug!(path = %path.display(), servers = namespace.dns_server.len(), "Wrote resolv.conf");
        Ok(Some(path))
    }

    /// Remove the namespace's `resolv.conf` and its directory if empty.
    fn remove_resolv_conf(&self, namespace: &Namespace) -> NetnsResult<()> {
        let path = self.settings.paths.resolv_conf(&namespace.name);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed resolv.conf"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(NetnsError::io(&path, e)),
        }

        let dir = self.settings.paths.netns_config_dir(&namespace.name);
        match std::fs::remove_dir(&dir) {
            Ok(()) => Ok(()),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::DirectoryNotEmpty
                ) =>
            {
                Ok(())
            }
            Err(e) => Err(NetnsError::io(&dir, e)),
        }
    }
}

fn peer_config(peer: &Peer) -> PeerConfig<'_> {
    PeerConfig {
        public_key: &peer.public_key,
        preshared_key: peer.preshared_key.as_ref().map(|key| key.expose()),
        persistent_keepalive: peer.persistent_keepalive,
        endpoint: peer.endpoint.as_deref(),
        allowed_ips: &peer.allowed_ips,
    }
}

/// Teardown bookkeeping: propagate when checking, collect otherwise.
struct Steps {
    check: bool,
    report: TeardownReport,
}

impl Steps {
    fn new(check: bool) -> Self {
        Self {
            check,
            report: TeardownReport::default(),
        }
    }

    fn record(&mut self, step: &str, result: NetnsResult<()>) -> NetnsResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if self.check => Err(err),
            Err(err) => {
                tracing::warn!(step, error = %err, "Teardown step failed, continuing");
                self.report.errors.push(err);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use wg_netns_common::NetnsPaths;
    use wg_netns_network::testing::SimulatedNetwork;

    use super::*;
    use crate::profile::{Hook, Secret};

    fn settings(dir: &TempDir) -> Settings {
        Settings {
            paths: NetnsPaths::with_dirs(dir.path().join("profiles"), dir.path().join("netns")),
            ..Settings::default()
        }
    }

    fn vpn() -> Namespace {
        let mut peer = Peer::new("PUB");
        peer.preshared_key = Some(Secret::new("PSK"));
        peer.endpoint = Some("vpn.example.com:51820".to_string());
        peer.persistent_keepalive = 25;
        peer.allowed_ips = vec!["0.0.0.0/0".to_string(), "::/0".to_string()];

        let mut interface = Interface::new("wg0");
        interface.private_key = Some(Secret::new("PRIVATE"));
        interface.address = vec!["10.0.0.2/24".to_string(), "fd00::2/64".to_string()];
        interface.listen_port = 51820;
        interface.peers.push(peer);

        let mut namespace = Namespace::new("vpn");
        namespace.dns_server = vec!["10.0.0.1".to_string()];
        namespace.hooks.pre_up = Some(Hook::script("echo up"));
        namespace.interfaces.push(interface);
        namespace
    }

    #[tokio::test]
    async fn setup_command_sequence() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);

        orchestrator.setup(&vpn()).await.unwrap();

        assert_eq!(orchestrator.state(), ProvisionState::Up);
        insta::assert_debug_snapshot!(network.command_lines(), @r#"
        [
            "ip -j netns list",
            "ip netns add vpn",
            "ip -n vpn link set dev lo up",
            "ip netns exec vpn /bin/sh -c echo up",
            "ip link add wg0 type wireguard",
            "ip link set wg0 netns vpn",
            "ip netns exec vpn wg set wg0 listen-port 51820",
            "ip netns exec vpn wg set wg0 fwmark 0",
            "ip netns exec vpn wg set wg0 private-key /dev/stdin",
            "ip netns exec vpn wg set wg0 peer PUB preshared-key /dev/stdin persistent-keepalive 25 endpoint vpn.example.com:51820 allowed-ips 0.0.0.0/0,::/0",
            "ip -n vpn -4 address add 10.0.0.2/24 dev wg0",
            "ip -n vpn -6 address add fd00::2/64 dev wg0",
            "ip -n vpn link set dev wg0 mtu 1420 up",
            "ip -n vpn -4 route add 0.0.0.0/0 dev wg0",
            "ip -n vpn -6 route add ::/0 dev wg0",
        ]
        "#);

        let resolv = std::fs::read_to_string(settings.paths.resolv_conf("vpn")).unwrap();
        assert_eq!(resolv, "nameserver 10.0.0.1\n");
    }

    #[tokio::test]
    async fn teardown_removes_everything() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);
        let namespace = vpn();

        orchestrator.setup(&namespace).await.unwrap();
        network.clear_calls();

        let report = orchestrator.teardown(&namespace, true).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(orchestrator.state(), ProvisionState::Unconfigured);
        assert_eq!(
            network.command_lines(),
            [
                "ip -n vpn link show wg0",
                "ip -n vpn link set wg0 down",
                "ip -n vpn link delete wg0",
                "ip -j netns list",
                "ip netns delete vpn",
            ]
        );
        assert!(network.namespaces().is_empty());
        assert!(!settings.paths.resolv_conf("vpn").exists());
        assert!(!settings.paths.netns_config_dir("vpn").exists());
    }

    #[tokio::test]
    async fn resolv_dir_kept_when_not_empty() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);
        let namespace = vpn();

        orchestrator.setup(&namespace).await.unwrap();
        let extra = settings.paths.netns_config_dir("vpn").join("hosts");
        std::fs::write(&extra, "").unwrap();

        orchestrator.teardown(&namespace, true).await.unwrap();
        assert!(!settings.paths.resolv_conf("vpn").exists());
        assert!(extra.exists());
    }

    #[tokio::test]
    async fn best_effort_teardown_of_nothing() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);

        let report = orchestrator.teardown(&vpn(), false).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(
            network.command_lines(),
            ["ip -n vpn link show wg0", "ip -j netns list"]
        );
    }

    #[tokio::test]
    async fn strict_teardown_aborts() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new()
            .with_namespace("vpn")
            .with_link(Some("vpn"), "wg0")
            .fail_when(|argv| argv.ends_with(&["wg0", "down"]));
        let orchestrator = Orchestrator::new(&network, &settings);
        let namespace = vpn();

        assert!(orchestrator.teardown(&namespace, true).await.is_err());
        assert_eq!(network.namespaces(), ["vpn"]);
        assert!(network.has_link(Some("vpn"), "wg0"));
    }

    #[tokio::test]
    async fn forced_teardown_collects_hook_failures() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new()
            .with_namespace("vpn")
            .with_link(Some("vpn"), "wg0")
            .fail_when(|argv| argv.last() == Some(&"exit 1"));
        let orchestrator = Orchestrator::new(&network, &settings);
        let mut namespace = vpn();
        namespace.hooks.pre_down = Some(Hook::script("exit 1"));

        let report = orchestrator.down(&namespace, true).await.unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(network.namespaces().is_empty());
    }

    #[tokio::test]
    async fn managed_namespace_must_not_exist() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new().with_namespace("vpn");
        let orchestrator = Orchestrator::new(&network, &settings);

        let err = orchestrator.setup(&vpn()).await.unwrap_err();
        assert!(matches!(err, NetnsError::NamespaceExists { ref name } if name == "vpn"));
        assert_eq!(network.command_lines(), ["ip -j netns list"]);
    }

    #[tokio::test]
    async fn unmanaged_namespace_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new().with_namespace("vpn");
        let orchestrator = Orchestrator::new(&network, &settings);
        let mut namespace = vpn();
        namespace.managed = false;

        orchestrator.setup(&namespace).await.unwrap();
        assert!(!network.command_lines().iter().any(|line| line.contains("netns add")));

        orchestrator.teardown(&namespace, true).await.unwrap();
        assert_eq!(network.namespaces(), ["vpn"]);
        assert!(!network.has_link(Some("vpn"), "wg0"));
    }

    #[tokio::test]
    async fn failed_setup_rolls_back() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new().fail_when(|argv| argv.contains(&"route"));
        let orchestrator = Orchestrator::new(&network, &settings);

        let err = orchestrator.up(&vpn(), std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("route add 0.0.0.0/0"));
        assert!(network.namespaces().is_empty());
        assert!(!network.has_link(Some("vpn"), "wg0"));
        assert!(!settings.paths.resolv_conf("vpn").exists());
    }

    #[tokio::test]
    async fn interrupt_rolls_back() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);

        let err = orchestrator.up(&vpn(), std::future::ready(())).await.unwrap_err();
        assert!(matches!(err, NetnsError::Interrupted));
        assert_eq!(orchestrator.state(), ProvisionState::Unconfigured);
        assert!(network.namespaces().is_empty());
    }

    #[tokio::test]
    async fn rollback_is_not_raced_against_interrupt() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);
        let polls = std::cell::Cell::new(0);
        let interrupt = std::future::poll_fn(|_| {
            polls.set(polls.get() + 1);
            std::task::Poll::Ready(())
        });

        let err = orchestrator.up(&vpn(), interrupt).await.unwrap_err();
        assert!(matches!(err, NetnsError::Interrupted));
        assert_eq!(polls.get(), 1);
        assert!(
            network
                .command_lines()
                .iter()
                .any(|line| line == "ip -n vpn link show wg0")
        );
    }

    #[test]
    fn resolv_conf_rewrite_is_stable() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new();
        let orchestrator = Orchestrator::new(&network, &settings);
        let mut namespace = vpn();
        namespace.dns_server = vec!["1.1.1.1".to_string(), "2606:4700:4700::1111".to_string()];

        let path = orchestrator.write_resolv_conf(&namespace).unwrap().unwrap();
        let first = std::fs::read(&path).unwrap();
        orchestrator.write_resolv_conf(&namespace).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);
        assert_eq!(first, b"nameserver 1.1.1.1\nnameserver 2606:4700:4700::1111\n");

        namespace.dns_server.clear();
        assert!(orchestrator.write_resolv_conf(&namespace).unwrap().is_none());
    }

    #[tokio::test]
    async fn keyless_interface_skips_private_key() {
        let dir = TempDir::new().unwrap();
        let settings = settings(&dir);
        let network = SimulatedNetwork::new().with_namespace("outer");
        let orchestrator = Orchestrator::new(&network, &settings);

        let mut interface = Interface::new("wg1");
        interface.base_netns = Some("outer".to_string());
        let mut namespace = Namespace::new("inner");
        namespace.interfaces.push(interface);

        orchestrator.setup(&namespace).await.unwrap();
        let lines = network.command_lines();
        assert!(lines.contains(&"ip -n outer link add wg1 type wireguard".to_string()));
        assert!(lines.contains(&"ip -n outer link set wg1 netns inner".to_string()));
        assert!(!lines.iter().any(|line| line.contains("private-key")));
        assert!(network.has_link(Some("inner"), "wg1"));
        assert!(!settings.paths.resolv_conf("inner").exists());
    }
}
