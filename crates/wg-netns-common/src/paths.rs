//! Standard filesystem paths for wg-netns.

use std::path::{Path, PathBuf};

/// Default directory searched for profiles given by bare name.
pub const DEFAULT_PROFILE_DIR: &str = "/etc/wireguard";

/// Default per-namespace configuration directory used by `ip netns exec`.
pub const DEFAULT_NETNS_DIR: &str = "/etc/netns";

/// Profile extensions tried, in order, when resolving a bare profile name.
pub const PROFILE_EXTENSIONS: [&str; 4] = ["yaml", "yml", "json", "conf"];

/// Directories used by wg-netns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetnsPaths {
    /// Profile directory (default: /etc/wireguard).
    pub profile_dir: PathBuf,
    /// Namespace configuration directory (default: /etc/netns).
    pub netns_dir: PathBuf,
}

impl NetnsPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths rooted at custom directories.
    #[must_use]
    pub fn with_dirs(profile_dir: impl Into<PathBuf>, netns_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            netns_dir: netns_dir.into(),
        }
    }

    /// Configuration directory of a namespace.
    #[must_use]
    pub fn netns_config_dir(&self, namespace: &str) -> PathBuf {
        self.netns_dir.join(namespace)
    }

    /// Resolver configuration file of a namespace.
    #[must_use]
    pub fn resolv_conf(&self, namespace: &str) -> PathBuf {
        self.netns_config_dir(namespace).join("resolv.conf")
    }

    /// Candidate files for a bare profile name, in priority order.
    #[must_use]
    pub fn profile_candidates(&self, name: &str) -> Vec<PathBuf> {
        PROFILE_EXTENSIONS
            .iter()
            .map(|extension| self.profile_dir.join(format!("{name}.{extension}")))
            .collect()
    }
}

impl Default for NetnsPaths {
    fn default() -> Self {
        Self::with_dirs(DEFAULT_PROFILE_DIR, DEFAULT_NETNS_DIR)
    }
}

/// Expand a leading `~` to the current user's home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
