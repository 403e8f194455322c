//! # wg-netns
//!
//! Run WireGuard interfaces inside dedicated Linux network namespaces.
//!
//! A profile (YAML, JSON, or a tunnel `.conf` file) describes a namespace,
//! its interfaces and peers, and optional hooks. [`Orchestrator`] applies it
//! by driving `ip` and `wg`, and removes it again in reverse.
//!
//! ## Modules
//!
//! - [`profile`]: Profile model and parsers
//! - [`orchestrator`]: Setup, teardown and rollback
//! - [`hooks`]: Hook execution
//! - [`cli`]: Command-line interface

#![warn(missing_docs)]

pub mod cli;
pub mod hooks;
pub mod orchestrator;
pub mod profile;

pub use orchestrator::{Orchestrator, ProvisionState, TeardownReport};
pub use profile::{Dialect, Hook, HookItem, HookPoint, Interface, Namespace, Peer, load_profile};
