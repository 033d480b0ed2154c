//! Error types for syndicate-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SiteId;

/// All errors that can arise from site registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse site config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.syndicate/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No configuration file exists for the site.
    #[error("site {site} is not registered")]
    SiteNotFound { site: SiteId },

    /// Site id zero is reserved for "no site".
    #[error("site id 0 is not a valid site")]
    InvalidSite,
}

/// Rejected input when parsing a [`SiteStatus`](crate::types::SiteStatus).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusParseError {
    #[error("status is empty")]
    Empty,

    #[error("unknown status '{0}'; expected: idle, pulling, pushing, processing")]
    Unknown(String),
}
