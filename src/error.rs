use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Invalid sandbox configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Certificate error in {}: {message}", path.display())]
    Certificate { path: PathBuf, message: String },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of a [`SandboxError`], for callers deciding
/// whether to abort or warn and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidConfiguration,
    IoFailure,
    Certificate,
    Catalog,
    Config,
    Serialization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidConfiguration => write!(f, "invalid configuration"),
            Self::IoFailure => write!(f, "io failure"),
            Self::Certificate => write!(f, "certificate"),
            Self::Catalog => write!(f, "catalog"),
            Self::Config => write!(f, "config"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

impl SandboxError {
    /// Wrap an IO error with the path that was being touched.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::Io { .. } => ErrorKind::IoFailure,
            Self::Certificate { .. } => ErrorKind::Certificate,
            Self::Catalog(_) => ErrorKind::Catalog,
            Self::Config(_) | Self::Toml(_) => ErrorKind::Config,
            Self::Json(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the run must be aborted. A certificate that cannot be parsed
    /// only loses the cert mapping, everything else leaves no usable sandbox.
    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Certificate)
    }

    /// 1 for a bad selection or catalog lookup, 2 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::InvalidConfiguration | ErrorKind::Catalog => 1,
            _ => 2,
        }
    }
}
