//! # wg-netns-common
//!
//! Shared types for wg-netns.
//!
//! This crate provides functionality used across all wg-netns crates:
//! - Common error types
//! - Standard filesystem paths
//! - Settings loaded once from the environment

#![warn(missing_docs)]

pub mod error;
pub mod paths;
pub mod settings;

pub use error::{ErrorKind, Location, NetnsError, NetnsResult};
pub use paths::NetnsPaths;
pub use settings::Settings;
