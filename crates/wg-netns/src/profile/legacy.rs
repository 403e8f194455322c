//! Tunnel config files (`wg0.conf`).
//!
//! One `[Interface]` section and any number of `[Peer]` sections. The
//! namespace and the interface are both named after the file stem. Keys are
//! case-insensitive; `#` starts a comment. Keys wg-netns cannot honor, such as
//! `PostUp` or `SaveConfig`, are errors rather than silently dropped.

use std::path::Path;
use std::str::FromStr;

use wg_netns_common::{Location, NetnsError, NetnsResult};

use super::{Interface, Namespace, Peer, Secret};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Interface,
    Peer,
}

/// `key = value` pair with its line number.
#[derive(Debug)]
struct Pair<'a> {
    line: usize,
    key: &'a str,
    value: &'a str,
}

/// A section header and the pairs following it.
#[derive(Debug)]
struct Block<'a> {
    kind: SectionKind,
    line: usize,
    pairs: Vec<Pair<'a>>,
}

/// Parse a tunnel config file.
///
/// # Errors
///
/// Returns the first structural or value error, located by line.
pub fn parse(content: &str, path: &Path) -> NetnsResult<Namespace> {
    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| NetnsError::MissingField {
            location: Location::file(path),
            field: "name".to_string(),
        })?;

    let mut interface: Option<Interface> = None;
    let mut dns = Vec::new();
    let mut peers = Vec::new();

    for block in scan(content, path)? {
        match block.kind {
            SectionKind::Interface => {
                if interface.is_some() {
                    return Err(NetnsError::DuplicateSection {
                        location: Location::line(path, block.line),
                        section: "Interface".to_string(),
                    });
                }
                let mut parsed = Interface::new(name);
                dns = interface_block(&block, path, &mut parsed)?;
                interface = Some(parsed);
            }
            SectionKind::Peer => peers.push(peer_block(&block, path)?),
        }
    }

    let mut interface = interface.ok_or_else(|| NetnsError::MissingSection {
        path: path.to_path_buf(),
        section: "Interface".to_string(),
    })?;
    interface.peers = peers;

    let mut namespace = Namespace::new(name);
    namespace.dns_server = dns;
    namespace.interfaces.push(interface);
    Ok(namespace)
}

/// Group non-empty lines under the most recent section header.
fn scan<'a>(content: &'a str, path: &Path) -> NetnsResult<Vec<Block<'a>>> {
    let mut blocks: Vec<Block<'a>> = Vec::new();

    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let text = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
        if text.is_empty() {
            continue;
        }

        if let Some(header) = text.strip_prefix('[') {
            let Some(section) = header.strip_suffix(']') else {
                return Err(malformed(path, line, raw));
            };
            let section = section.trim();
            let kind = if section.eq_ignore_ascii_case("interface") {
                SectionKind::Interface
            } else if section.eq_ignore_ascii_case("peer") {
                SectionKind::Peer
            } else {
                return Err(NetnsError::UnknownSection {
                    location: Location::line(path, line),
                    section: section.to_string(),
                });
            };
            blocks.push(Block {
                kind,
                line,
                pairs: Vec::new(),
            });
            continue;
        }

        let Some((key, value)) = text.split_once('=') else {
            return Err(malformed(path, line, raw));
        };
        let key = key.trim();
        let Some(block) = blocks.last_mut().filter(|_| !key.is_empty()) else {
            return Err(malformed(path, line, raw));
        };
        block.pairs.push(Pair {
            line,
            key,
            value: value.trim(),
        });
    }

    Ok(blocks)
}

fn malformed(path: &Path, line: usize, raw: &str) -> NetnsError {
    NetnsError::MalformedLine {
        location: Location::line(path, line),
        content: raw.trim().to_string(),
    }
}

fn unsupported(path: &Path, pair: &Pair<'_>, section: &str) -> NetnsError {
    NetnsError::UnsupportedKey {
        location: Location::line(path, pair.line),
        section: section.to_string(),
        key: pair.key.to_string(),
    }
}

/// Fill `interface` from an `[Interface]` block, returning its DNS servers.
fn interface_block(
    block: &Block<'_>,
    path: &Path,
    interface: &mut Interface,
) -> NetnsResult<Vec<String>> {
    let mut dns = Vec::new();
    for pair in &block.pairs {
        match pair.key.to_ascii_lowercase().as_str() {
            "address" => interface.address.extend(split_list(pair.value)),
            "listenport" => interface.listen_port = number(pair, path)?,
            "privatekey" => interface.private_key = present(pair.value).map(Secret::new),
            "dns" => dns.extend(split_list(pair.value)),
            "mtu" => interface.mtu = number(pair, path)?,
            _ => return Err(unsupported(path, pair, "interface")),
        }
    }
    Ok(dns)
}

fn peer_block(block: &Block<'_>, path: &Path) -> NetnsResult<Peer> {
    let mut public_key = None;
    let mut preshared_key = None;
    let mut endpoint = None;
    let mut persistent_keepalive = 0;
    let mut allowed_ips = Vec::new();

    for pair in &block.pairs {
        match pair.key.to_ascii_lowercase().as_str() {
            "publickey" => public_key = Some(pair.value.to_string()),
            "presharedkey" => preshared_key = present(pair.value).map(Secret::new),
            "endpoint" => endpoint = present(pair.value).map(str::to_string),
            "persistentkeepalive" => {
                persistent_keepalive = if pair.value.eq_ignore_ascii_case("off") {
                    0
                } else {
                    number(pair, path)?
                };
            }
            "allowedips" => allowed_ips.extend(split_list(pair.value)),
            _ => return Err(unsupported(path, pair, "peer")),
        }
    }

    let public_key = public_key.ok_or_else(|| NetnsError::MissingField {
        location: Location::line(path, block.line),
        field: "PublicKey".to_string(),
    })?;

    Ok(Peer {
        preshared_key,
        endpoint,
        persistent_keepalive,
        allowed_ips,
        ..Peer::new(public_key)
    })
}

/// Empty keys and endpoints count as unset.
fn present(value: &str) -> Option<&str> {
    Some(value).filter(|value| !value.is_empty())
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

fn number<T>(pair: &Pair<'_>, path: &Path) -> NetnsResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    pair.value.parse().map_err(|e: T::Err| NetnsError::InvalidValue {
        location: Location::line(path, pair.line),
        key: pair.key.to_string(),
        value: pair.value.to_string(),
        reason: e.to_string(),
    })
}
