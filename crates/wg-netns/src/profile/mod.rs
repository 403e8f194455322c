//! Profile model and loading.
//!
//! A profile describes one network namespace together with the wireguard
//! interfaces, peers and hooks that live in it. Two dialects are accepted,
//! selected by file extension:
//!
//! - `.yaml`, `.yml`, `.json`: the structured dialect ([`structured`])
//! - `.conf`: the tunnel tool's own `[Interface]`/`[Peer]` format ([`legacy`])
//!
//! Both decode into the same [`Namespace`] graph, which is immutable once
//! built.

pub mod legacy;
pub mod structured;

use std::fmt;
use std::path::{Path, PathBuf};

use wg_netns_common::{NetnsError, NetnsPaths, NetnsResult};

/// Default interface MTU.
pub const DEFAULT_MTU: u32 = 1420;

/// Key material that must not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap a key.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The key itself.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Network namespace and everything configured inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Namespace name.
    pub name: String,
    /// Whether the namespace is created and deleted by wg-netns.
    pub managed: bool,
    /// Resolvers written to the namespace's `resolv.conf`.
    pub dns_server: Vec<String>,
    /// Interfaces, in setup order.
    pub interfaces: Vec<Interface>,
    /// Lifecycle hooks.
    pub hooks: Hooks,
}

impl Namespace {
    /// Managed namespace without interfaces or hooks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            managed: true,
            dns_server: Vec::new(),
            interfaces: Vec::new(),
            hooks: Hooks::default(),
        }
    }
}

/// Wireguard interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    /// Interface name.
    pub name: String,
    /// Namespace the interface is created in before being moved (host when `None`).
    pub base_netns: Option<String>,
    /// Private key; `None` leaves the key to someone else.
    pub private_key: Option<Secret>,
    /// Public key, informational only.
    pub public_key: Option<String>,
    /// Addresses in CIDR notation.
    pub address: Vec<String>,
    /// UDP listen port (0 = ephemeral).
    pub listen_port: u16,
    /// Firewall mark (0 = unset).
    pub fwmark: u32,
    /// Link MTU.
    pub mtu: u32,
    /// Peers, in setup order.
    pub peers: Vec<Peer>,
}

impl Interface {
    /// Interface with default settings and no peers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_netns: None,
            private_key: None,
            public_key: None,
            address: Vec::new(),
            listen_port: 0,
            fwmark: 0,
            mtu: DEFAULT_MTU,
            peers: Vec::new(),
        }
    }
}

/// Wireguard peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    /// Peer public key.
    pub public_key: String,
    /// Preshared key.
    pub preshared_key: Option<Secret>,
    /// Display name, informational only.
    pub name: Option<String>,
    /// `host:port` of the remote end.
    pub endpoint: Option<String>,
    /// Keepalive interval in seconds (0 = disabled).
    pub persistent_keepalive: u16,
    /// Networks the peer is cryptographically allowed to use.
    pub allowed_ips: Vec<String>,
    /// Networks routed to the interface instead of `allowed_ips`.
    pub routes: Option<Vec<String>>,
}

impl Peer {
    /// Peer with only a public key.
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            preshared_key: None,
            name: None,
            endpoint: None,
            persistent_keepalive: 0,
            allowed_ips: Vec::new(),
            routes: None,
        }
    }

    /// Networks to install routes for.
    #[must_use]
    pub fn route_networks(&self) -> &[String] {
        self.routes.as_deref().unwrap_or(&self.allowed_ips)
    }
}

/// Point in the lifecycle at which a hook runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After the namespace exists, before any interface.
    PreUp,
    /// After full setup.
    PostUp,
    /// Before any teardown step.
    PreDown,
    /// After interfaces are removed.
    PostDown,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreUp => write!(f, "pre-up"),
            Self::PostUp => write!(f, "post-up"),
            Self::PreDown => write!(f, "pre-down"),
            Self::PostDown => write!(f, "post-down"),
        }
    }
}

/// The four hook slots of a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hooks {
    /// Runs before interfaces are created.
    pub pre_up: Option<Hook>,
    /// Runs after setup completed.
    pub post_up: Option<Hook>,
    /// Runs before teardown.
    pub pre_down: Option<Hook>,
    /// Runs after interfaces are removed.
    pub post_down: Option<Hook>,
}

impl Hooks {
    /// Hook registered for `point`, if any.
    #[must_use]
    pub const fn get(&self, point: HookPoint) -> Option<&Hook> {
        match point {
            HookPoint::PreUp => self.pre_up.as_ref(),
            HookPoint::PostUp => self.post_up.as_ref(),
            HookPoint::PreDown => self.pre_down.as_ref(),
            HookPoint::PostDown => self.post_down.as_ref(),
        }
    }
}

/// Ordered list of shell commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hook {
    /// Commands, run in order.
    pub items: Vec<HookItem>,
}

impl Hook {
    /// Hook with a single namespace-scoped command.
    pub fn script(command: impl Into<String>) -> Self {
        Self {
            items: vec![HookItem::in_namespace(command)],
        }
    }
}

/// Single hook command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookItem {
    /// Shell command line.
    pub command: String,
    /// Run on the host instead of inside the namespace.
    pub host_namespace: bool,
}

impl HookItem {
    /// Command run inside the namespace.
    pub fn in_namespace(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            host_namespace: false,
        }
    }

    /// Command run on the host.
    pub fn on_host(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            host_namespace: true,
        }
    }
}

/// Profile encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// YAML document.
    Yaml,
    /// JSON document.
    Json,
    /// `[Interface]`/`[Peer]` configuration file.
    Legacy,
}

impl Dialect {
    /// Select the dialect from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`NetnsError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> NetnsResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "conf" => Ok(Self::Legacy),
            other => Err(NetnsError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: other.to_string(),
            }),
        }
    }
}

/// Resolve a profile argument to a file.
///
/// A bare name (no directory component) that is not an existing file is
/// looked up in the profile directory as `<name>.yaml`, `<name>.yml`,
/// `<name>.json` and `<name>.conf`, in that order. Otherwise the argument is
/// returned unchanged.
#[must_use]
pub fn resolve_profile(profile: &Path, paths: &NetnsPaths) -> PathBuf {
    let bare = profile
        .parent()
        .is_none_or(|parent| parent.as_os_str().is_empty());
    if bare && !profile.is_file() {
        let name = profile.to_string_lossy();
        if let Some(found) = paths
            .profile_candidates(&name)
            .into_iter()
            .find(|candidate| candidate.is_file())
        {
            tracing::debug!(profile = %found.display(), "Resolved profile by name");
            return found;
        }
    }
    profile.to_path_buf()
}

/// Resolve, read and parse a profile.
///
/// # Errors
///
/// Returns a configuration error if the file is missing, has an unsupported
/// extension, or does not describe a valid namespace.
pub fn load_profile(profile: &Path, paths: &NetnsPaths) -> NetnsResult<Namespace> {
    let path = resolve_profile(profile, paths);
    let content = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            NetnsError::ProfileNotFound { path: path.clone() }
        } else {
            NetnsError::io(&path, e)
        }
    })?;
    let namespace = parse_profile(&content, &path)?;
    tracing::debug!(
        profile = %path.display(),
        namespace = %namespace.name,
        interfaces = namespace.interfaces.len(),
        "Loaded profile"
    );
    Ok(namespace)
}

/// Parse profile text, choosing the dialect from `path`.
///
/// # Errors
///
/// Returns a configuration error describing the first problem found.
pub fn parse_profile(content: &str, path: &Path) -> NetnsResult<Namespace> {
    match Dialect::from_path(path)? {
        Dialect::Yaml => structured::parse_yaml(content, path),
        Dialect::Json => structured::parse_json(content, path),
        Dialect::Legacy => legacy::parse(content, path),
    }
}
