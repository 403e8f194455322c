//! YAML and JSON profiles.
//!
//! Keys may be written with either `-` or `_`. Unknown keys are rejected,
//! and decode errors carry the line and column reported by the decoder.

use std::path::Path;

use serde::Deserialize;

use wg_netns_common::{Location, NetnsError, NetnsResult};

use super::{DEFAULT_MTU, Hook, HookItem, Hooks, Interface, Namespace, Peer, Secret};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawNamespace {
    name: Option<String>,
    #[serde(default = "default_managed")]
    managed: bool,
    #[serde(default, alias = "dns_server")]
    dns_server: Vec<String>,
    #[serde(default, alias = "base_netns")]
    base_netns: Option<String>,
    #[serde(default, alias = "pre_up")]
    pre_up: Option<RawHook>,
    #[serde(default, alias = "post_up")]
    post_up: Option<RawHook>,
    #[serde(default, alias = "pre_down")]
    pre_down: Option<RawHook>,
    #[serde(default, alias = "post_down")]
    post_down: Option<RawHook>,
    #[serde(default)]
    interfaces: Vec<RawInterface>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawInterface {
    name: Option<String>,
    #[serde(default, alias = "base_netns")]
    base_netns: Option<String>,
    #[serde(default, alias = "private_key")]
    private_key: Option<String>,
    #[serde(default, alias = "public_key")]
    public_key: Option<String>,
    #[serde(default)]
    address: Vec<String>,
    #[serde(default, alias = "listen_port")]
    listen_port: u16,
    #[serde(default)]
    fwmark: u32,
    #[serde(default = "default_mtu")]
    mtu: u32,
    #[serde(default)]
    peers: Vec<RawPeer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawPeer {
    #[serde(alias = "public_key")]
    public_key: Option<String>,
    #[serde(default, alias = "preshared_key")]
    preshared_key: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default, alias = "persistent_keepalive")]
    persistent_keepalive: u16,
    #[serde(default, alias = "allowed_ips")]
    allowed_ips: Vec<String>,
    #[serde(default)]
    routes: Option<Vec<String>>,
}

/// A hook is either one script or a list of entries.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHook {
    Script(String),
    Entries(Vec<RawHookEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHookEntry {
    Script(String),
    Item(RawHookItem),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct RawHookItem {
    command: String,
    #[serde(default, alias = "host_namespace")]
    host_namespace: bool,
}

const fn default_managed() -> bool {
    true
}

const fn default_mtu() -> u32 {
    DEFAULT_MTU
}

/// Parse a YAML profile.
///
/// # Errors
///
/// Returns [`NetnsError::Syntax`] for undecodable documents and
/// [`NetnsError::MissingField`] when a required name or key is absent.
pub fn parse_yaml(content: &str, path: &Path) -> NetnsResult<Namespace> {
    let raw: RawNamespace = serde_yaml::from_str(content).map_err(|e| syntax(path, &e))?;
    raw.into_namespace(path)
}

/// Parse a JSON profile.
///
/// # Errors
///
/// Same as [`parse_yaml`].
pub fn parse_json(content: &str, path: &Path) -> NetnsResult<Namespace> {
    let raw: RawNamespace = serde_json::from_str(content).map_err(|e| syntax(path, &e))?;
    raw.into_namespace(path)
}

fn syntax(path: &Path, error: &dyn std::fmt::Display) -> NetnsError {
    NetnsError::Syntax {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Empty keys and endpoints count as unset.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn required(value: Option<String>, path: &Path, field: impl Into<String>) -> NetnsResult<String> {
    value.ok_or_else(|| NetnsError::MissingField {
        location: Location::file(path),
        field: field.into(),
    })
}

impl RawNamespace {
    fn into_namespace(self, path: &Path) -> NetnsResult<Namespace> {
        let name = required(self.name, path, "name")?;
        let base_netns = self.base_netns;
        let interfaces = self
            .interfaces
            .into_iter()
            .enumerate()
            .map(|(index, raw)| raw.into_interface(path, index, base_netns.as_deref()))
            .collect::<NetnsResult<Vec<_>>>()?;

        Ok(Namespace {
            name,
            managed: self.managed,
            dns_server: self.dns_server,
            interfaces,
            hooks: Hooks {
                pre_up: self.pre_up.map(Hook::from),
                post_up: self.post_up.map(Hook::from),
                pre_down: self.pre_down.map(Hook::from),
                post_down: self.post_down.map(Hook::from),
            },
        })
    }
}

impl RawInterface {
    fn into_interface(
        self,
        path: &Path,
        index: usize,
        namespace_base: Option<&str>,
    ) -> NetnsResult<Interface> {
        let name = required(self.name, path, format!("interfaces[{index}].name"))?;
        let peers = self
            .peers
            .into_iter()
            .enumerate()
            .map(|(peer, raw)| {
                raw.into_peer(path, &format!("interfaces[{index}].peers[{peer}]"))
            })
            .collect::<NetnsResult<Vec<_>>>()?;

        Ok(Interface {
            name,
            base_netns: self.base_netns.or_else(|| namespace_base.map(str::to_string)),
            private_key: present(self.private_key).map(Secret::new),
            public_key: self.public_key,
            address: self.address,
            listen_port: self.listen_port,
            fwmark: self.fwmark,
            mtu: self.mtu,
            peers,
        })
    }
}

impl RawPeer {
    fn into_peer(self, path: &Path, prefix: &str) -> NetnsResult<Peer> {
        Ok(Peer {
            public_key: required(self.public_key, path, format!("{prefix}.public-key"))?,
            preshared_key: present(self.preshared_key).map(Secret::new),
            name: self.name,
            endpoint: present(self.endpoint),
            persistent_keepalive: self.persistent_keepalive,
            allowed_ips: self.allowed_ips,
            routes: self.routes,
        })
    }
}

impl From<RawHook> for Hook {
    fn from(raw: RawHook) -> Self {
        let items = match raw {
            RawHook::Script(command) => vec![HookItem::in_namespace(command)],
            RawHook::Entries(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    RawHookEntry::Script(command) => HookItem::in_namespace(command),
                    RawHookEntry::Item(item) => HookItem {
                        command: item.command,
                        host_namespace: item.host_namespace,
                    },
                })
                .collect(),
        };
        Self { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(content: &str) -> NetnsResult<Namespace> {
        parse_yaml(content, Path::new("test.yaml"))
    }

    #[test]
    fn defaults() {
        let namespace = yaml("name: vpn\ninterfaces:\n  - name: wg0\n").unwrap();
        assert!(namespace.managed);
        assert!(namespace.dns_server.is_empty());
        assert_eq!(namespace.hooks, Hooks::default());

        let interface = &namespace.interfaces[0];
        assert_eq!(interface.mtu, 1420);
        assert_eq!(interface.listen_port, 0);
        assert_eq!(interface.fwmark, 0);
        assert!(interface.private_key.is_none());
        assert!(interface.base_netns.is_none());
    }

    #[test]
    fn full_profile() {
        let namespace = yaml(
            r"
name: ns-example
managed: true
dns-server: [10.10.10.1, 10.10.10.2]
pre-up: some shell command
post-up:
  - host-namespace: true
    command: some shell command
  - some shell command
interfaces:
  - name: wg-site-a
    address: [10.10.11.172/32, fc00:dead:beef:1::172/128]
    private-key: 4bvaEZHI...
    listen-port: 51821
    fwmark: 21
    peers:
      - public-key: bELgMXGt...
        endpoint: vpn1.example.com:51820
        persistent-keepalive: 25
        allowed-ips: [10.10.0.0/16, fc00:dead:beef:1::/64]
        routes: [10.10.0.0/16]
",
        )
        .unwrap();

        assert_eq!(namespace.name, "ns-example");
        assert_eq!(namespace.dns_server, ["10.10.10.1", "10.10.10.2"]);
        assert_eq!(namespace.hooks.pre_up, Some(Hook::script("some shell command")));
        assert_eq!(
            namespace.hooks.post_up.unwrap().items,
            vec![
                HookItem::on_host("some shell command"),
                HookItem::in_namespace("some shell command"),
            ]
        );

        let interface = &namespace.interfaces[0];
        assert_eq!(interface.listen_port, 51821);
        assert_eq!(interface.fwmark, 21);
        assert_eq!(interface.private_key.as_ref().unwrap().expose(), "4bvaEZHI...");

        let peer = &interface.peers[0];
        assert_eq!(peer.persistent_keepalive, 25);
        assert_eq!(peer.endpoint.as_deref(), Some("vpn1.example.com:51820"));
        assert_eq!(peer.route_networks(), ["10.10.0.0/16".to_string()]);
    }

    #[test]
    fn underscore_keys() {
        let dashed = yaml("name: vpn\ndns-server: [1.1.1.1]\ninterfaces:\n  - name: wg0\n    listen-port: 1\n").unwrap();
        let underscored = yaml("name: vpn\ndns_server: [1.1.1.1]\ninterfaces:\n  - name: wg0\n    listen_port: 1\n").unwrap();
        assert_eq!(dashed, underscored);
    }

    #[test]
    fn json_profile() {
        let namespace = parse_json(
            r#"{"name": "vpn", "managed": false, "interfaces": [{"name": "wg0", "mtu": 1280}]}"#,
            Path::new("vpn.json"),
        )
        .unwrap();
        assert!(!namespace.managed);
        assert_eq!(namespace.interfaces[0].mtu, 1280);
    }

    #[test]
    fn interface_base_netns_wins() {
        let namespace = yaml(
            "name: vpn\nbase-netns: outer\ninterfaces:\n  - name: wg0\n  - name: wg1\n    base-netns: inner\n",
        )
        .unwrap();
        assert_eq!(namespace.interfaces[0].base_netns.as_deref(), Some("outer"));
        assert_eq!(namespace.interfaces[1].base_netns.as_deref(), Some("inner"));
    }

    #[test]
    fn missing_name() {
        let err = yaml("interfaces: []\n").unwrap_err();
        assert!(matches!(err, NetnsError::MissingField { ref field, .. } if field == "name"));
    }

    #[test]
    fn missing_peer_key() {
        let err = yaml("name: vpn\ninterfaces:\n  - name: wg0\n    peers:\n      - endpoint: a:1\n")
            .unwrap_err();
        assert!(matches!(
            err,
            NetnsError::MissingField { ref field, .. } if field == "interfaces[0].peers[0].public-key"
        ));
    }

    #[test]
    fn unknown_key() {
        let err = yaml("name: vpn\ncolour: blue\n").unwrap_err();
        assert!(matches!(err, NetnsError::Syntax { .. }));
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn decode_errors_carry_line() {
        let err = yaml("name: vpn\ninterfaces:\n  - name: wg0\n    colour: blue\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("colour"), "{message}");
        assert!(message.contains(" at line "), "{message}");

        let err = parse_json(
            "{\n  \"name\": \"vpn\",\n  \"interfaces\": [{\"name\": \"wg0\", \"mtu\": \"big\"}]\n}",
            Path::new("vpn.json"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("line 3"), "{err}");
    }

    #[test]
    fn empty_keys_and_endpoint_are_unset() {
        let namespace = yaml(
            "name: vpn\ninterfaces:\n  - name: wg0\n    private-key: ''\n    peers:\n      - public-key: PUB\n        preshared-key: ''\n        endpoint: ''\n",
        )
        .unwrap();
        let interface = &namespace.interfaces[0];
        assert!(interface.private_key.is_none());
        assert!(interface.peers[0].preshared_key.is_none());
        assert!(interface.peers[0].endpoint.is_none());
    }

    #[test]
    fn underscore_hook_items() {
        let namespace =
            yaml("name: vpn\npost_down:\n  - command: ip link\n    host_namespace: true\n").unwrap();
        assert_eq!(
            namespace.hooks.post_down.unwrap().items,
            vec![HookItem::on_host("ip link")]
        );
    }

    #[test]
    fn wrong_type() {
        assert!(yaml("name: vpn\ninterfaces:\n  - name: wg0\n    mtu: big\n").is_err());
        assert!(yaml("name: vpn\ninterfaces:\n  - name: wg0\n    listen-port: 70000\n").is_err());
    }

    #[test]
    fn broken_documents() {
        assert!(yaml("").is_err());
        assert!(matches!(yaml("name: [").unwrap_err(), NetnsError::Syntax { .. }));
        assert!(matches!(
            parse_json("{", Path::new("x.json")).unwrap_err(),
            NetnsError::Syntax { .. }
        ));
    }
}
