//! # wg-netns-network
//!
//! Process plumbing for wg-netns.
//!
//! This crate drives the external `ip` and `wg` tools: it builds their
//! command lines, runs them through a [`ProcessExecutor`], and answers
//! existence queries for namespaces and links.

#![warn(missing_docs)]

pub mod command;
pub mod exec;
pub mod link;
pub mod netns;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wireguard;

pub use exec::{Invocation, ProcessExecutor, SystemExecutor};
pub use link::{WireguardLink, family_flag};
pub use netns::{create_netns, delete_netns, list_netns, netns_exists};
pub use wireguard::PeerConfig;
