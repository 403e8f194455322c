//! Process-wide settings, read once from the environment.

use std::path::PathBuf;

use crate::error::{NetnsError, NetnsResult};
use crate::paths::NetnsPaths;

/// Environment variable overriding the profile directory.
pub const ENV_PROFILE_DIR: &str = "WG_PROFILE_DIR";
/// Environment variable overriding the namespace configuration directory.
pub const ENV_NETNS_DIR: &str = "WG_NETNS_DIR";
/// Environment variable enabling verbose output when non-zero.
pub const ENV_VERBOSE: &str = "WG_VERBOSE";
/// Environment variable selecting the shell used for hooks.
pub const ENV_SHELL: &str = "WG_SHELL";

/// Default shell used for hooks.
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Settings shared by the parser and the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory layout.
    pub paths: NetnsPaths,
    /// Shell invoked with `-c` for hooks.
    pub shell: PathBuf,
    /// Echo every external command.
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: NetnsPaths::default(),
            shell: PathBuf::from(DEFAULT_SHELL),
            verbose: false,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`NetnsError::Environment`] if a variable holds an invalid value.
    pub fn from_env() -> NetnsResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`NetnsError::Environment`] if a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NetnsResult<Self> {
        let defaults = Self::default();

        let profile_dir = path_var(&lookup, ENV_PROFILE_DIR)?.unwrap_or(defaults.paths.profile_dir);
        let netns_dir = path_var(&lookup, ENV_NETNS_DIR)?.unwrap_or(defaults.paths.netns_dir);
        let shell = path_var(&lookup, ENV_SHELL)?.unwrap_or(defaults.shell);

        let verbose = match lookup(ENV_VERBOSE) {
            Some(value) => {
                let level: i64 = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                    NetnsError::Environment {
                        variable: ENV_VERBOSE.to_string(),
                        value: value.clone(),
                        reason: e.to_string(),
                    }
                })?;
                level != 0
            }
            None => defaults.verbose,
        };

        let settings = Self {
            paths: NetnsPaths::with_dirs(profile_dir, netns_dir),
            shell,
            verbose,
        };
        tracing::debug!(?settings, "Loaded settings");
        Ok(settings)
    }

    /// Force verbose output on.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = self.verbose || verbose;
        self
    }
}

fn path_var(
    lookup: &impl Fn(&str) -> Option<String>,
    variable: &str,
) -> NetnsResult<Option<PathBuf>> {
    match lookup(variable) {
        Some(value) if value.trim().is_empty() => Err(NetnsError::Environment {
            variable: variable.to_string(),
            value,
            reason: "path must not be empty".to_string(),
        }),
        Some(value) => Ok(Some(PathBuf::from(value))),
        None => Ok(None),
    }
}
