//! Common error types for wg-netns.

use std::fmt;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`NetnsError`].
pub type NetnsResult<T> = Result<T, NetnsError>;

/// Position inside a profile file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Profile file.
    pub path: PathBuf,
    /// 1-based line number, when known.
    pub line: Option<usize>,
}

impl Location {
    /// Location covering a whole file.
    #[must_use]
    pub fn file(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            line: None,
        }
    }

    /// Location of a single line.
    #[must_use]
    pub fn line(path: &Path, line: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.path.display(), line),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

/// Error category, printed next to the message by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing profile.
    Config,
    /// External tool failed.
    Execution,
    /// Invalid environment-derived setting.
    Environment,
    /// Local filesystem failure.
    Io,
    /// Operation cancelled by the user.
    Interrupted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "ConfigError"),
            Self::Execution => write!(f, "ExecutionError"),
            Self::Environment => write!(f, "EnvironmentError"),
            Self::Io => write!(f, "IoError"),
            Self::Interrupted => write!(f, "Interrupted"),
        }
    }
}

/// Errors across wg-netns.
#[derive(Error, Diagnostic, Debug)]
pub enum NetnsError {
    /// Profile file does not exist.
    #[error("profile not found: {}", .path.display())]
    #[diagnostic(
        code(wg_netns::profile::not_found),
        help("Pass a path, or a bare name resolved against WG_PROFILE_DIR")
    )]
    ProfileNotFound {
        /// The path that was tried last.
        path: PathBuf,
    },

    /// Profile extension is not one of the supported dialects.
    #[error("unsupported profile format '{extension}': {}", .path.display())]
    #[diagnostic(
        code(wg_netns::profile::unsupported_format),
        help("Use .yaml, .yml or .json for profiles, or .conf for tunnel configs")
    )]
    UnsupportedFormat {
        /// The profile path.
        path: PathBuf,
        /// The offending extension (empty if none).
        extension: String,
    },

    /// Line is neither a section header nor a `key = value` pair.
    #[error("malformed line at {location}: {content}")]
    #[diagnostic(code(wg_netns::profile::malformed_line))]
    MalformedLine {
        /// Where the line is.
        location: Location,
        /// The raw line.
        content: String,
    },

    /// Key is not supported inside its section.
    #[error("unsupported {section} key '{key}' at {location}")]
    #[diagnostic(code(wg_netns::profile::unsupported_key))]
    UnsupportedKey {
        /// Where the key is.
        location: Location,
        /// Lowercase section name (`interface` or `peer`).
        section: String,
        /// The key as written.
        key: String,
    },

    /// Section header is not `[Interface]` or `[Peer]`.
    #[error("unknown section '{section}' at {location}")]
    #[diagnostic(code(wg_netns::profile::unknown_section))]
    UnknownSection {
        /// Where the header is.
        location: Location,
        /// The section name as written.
        section: String,
    },

    /// Section that may appear only once appears again.
    #[error("duplicate section '{section}' at {location}")]
    #[diagnostic(
        code(wg_netns::profile::duplicate_section),
        help("Only one [Interface] section is allowed per file")
    )]
    DuplicateSection {
        /// Where the repeated header is.
        location: Location,
        /// The section name.
        section: String,
    },

    /// Required section is absent.
    #[error("missing section '{section}' in {}", .path.display())]
    #[diagnostic(code(wg_netns::profile::missing_section))]
    MissingSection {
        /// The profile path.
        path: PathBuf,
        /// The section name.
        section: String,
    },

    /// Required field is absent.
    #[error("missing required field '{field}' at {location}")]
    #[diagnostic(code(wg_netns::profile::missing_field))]
    MissingField {
        /// Where the owning entity is.
        location: Location,
        /// Field name.
        field: String,
    },

    /// Field value cannot be interpreted.
    #[error("invalid value '{value}' for '{key}' at {location}: {reason}")]
    #[diagnostic(code(wg_netns::profile::invalid_value))]
    InvalidValue {
        /// Where the value is.
        location: Location,
        /// Field name.
        key: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Structured document could not be decoded.
    #[error("failed to parse profile {}: {message}", .path.display())]
    #[diagnostic(code(wg_netns::profile::syntax))]
    Syntax {
        /// The profile path.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// Managed namespace already exists before setup.
    #[error("network namespace '{name}' already exists")]
    #[diagnostic(
        code(wg_netns::netns::exists),
        help("Tear the namespace down first, or set managed: false to reuse it")
    )]
    NamespaceExists {
        /// Namespace name.
        name: String,
    },

    /// External program exited unsuccessfully.
    #[error("subprocess failed: {command}: {message}")]
    #[diagnostic(code(wg_netns::exec::failed))]
    Execution {
        /// The command line, space-joined.
        command: String,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, or `exit code N`.
        message: String,
    },

    /// External program could not be started.
    #[error("failed to execute {program}: {source}")]
    #[diagnostic(
        code(wg_netns::exec::spawn),
        help("Make sure iproute2 and wireguard-tools are installed and in PATH")
    )]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Environment variable holds an invalid value.
    #[error("failed to load environment variable {variable}={value:?}: {reason}")]
    #[diagnostic(code(wg_netns::env::invalid))]
    Environment {
        /// Variable name.
        variable: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    #[diagnostic(code(wg_netns::io))]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Cancelled by an interrupt signal.
    #[error("interrupted")]
    #[diagnostic(code(wg_netns::interrupted))]
    Interrupted,
}

impl NetnsError {
    /// Category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ProfileNotFound { .. }
            | Self::UnsupportedFormat { .. }
            | Self::MalformedLine { .. }
            | Self::UnsupportedKey { .. }
            | Self::UnknownSection { .. }
            | Self::DuplicateSection { .. }
            | Self::MissingSection { .. }
            | Self::MissingField { .. }
            | Self::InvalidValue { .. }
            | Self::Syntax { .. } => ErrorKind::Config,
            Self::NamespaceExists { .. } | Self::Execution { .. } | Self::Spawn { .. } => {
                ErrorKind::Execution
            }
            Self::Environment { .. } => ErrorKind::Environment,
            Self::Io { .. } => ErrorKind::Io,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }

    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
