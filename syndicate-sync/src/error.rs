//! Error types for syndicate-sync.
//!
//! One enum per seam: the status store, the local content store, transports,
//! the reconciler, the status gate and the pull orchestrator. Orchestrator
//! failures wrap the lower layers so callers can decide whether to retry.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use syndicate_core::{LocalId, RegistryError, SiteId};

use crate::status::StatusReading;

/// Failures of the durable per-site status store.
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("status store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("site id 0 is not a valid site")]
    InvalidSite,

    /// Another process holds the status lock file for this site.
    #[error("status lock for site {site} is held elsewhere")]
    LockHeld { site: SiteId },
}

/// Failures reported by the local content, metadata or taxonomy store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("content store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("local record {id} does not exist")]
    NotFound { id: LocalId },

    #[error("content store lock {path} is held elsewhere")]
    LockHeld { path: PathBuf },

    /// The store refused the write (validation, constraint, backend error).
    #[error("store rejected write: {0}")]
    Rejected(String),
}

/// Failures inside a transport client's fetch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("site setting '{key}' is required by this transport")]
    MissingSetting { key: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode posts: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("remote source error: {0}")]
    Remote(String),

    #[error("failed to start fetch worker: {0}")]
    Worker(#[source] std::io::Error),

    #[error("fetch worker exited without a result")]
    WorkerLost,
}

/// Per-post reconciliation failures. Steps already committed for the post
/// stay committed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("post '{remote_id}' references local record {local_id}, which does not exist")]
    MissingLocalRecord { remote_id: String, local_id: LocalId },

    #[error("primary commit failed for post '{remote_id}': {source}")]
    PrimaryCommitFailed {
        remote_id: String,
        #[source]
        source: StoreError,
    },

    #[error("metadata write of '{key}' failed for record {local_id}: {source}")]
    MetadataWriteFailed {
        local_id: LocalId,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("taxonomy '{taxonomy}' write failed for record {local_id}: {source}")]
    TaxonomyWriteFailed {
        local_id: LocalId,
        taxonomy: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid batch input: {0}")]
    InvalidBatchInput(String),
}

/// Failures acquiring the status gate.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("site {site} is busy (status: {reading})")]
    Busy { site: SiteId, reading: StatusReading },

    #[error(transparent)]
    Store(#[from] StatusError),
}

/// Failures of one orchestrated pull. Returned, never panicked, so the caller
/// can decide whether to try again later.
#[derive(Debug, Error)]
pub enum PullError {
    #[error("site {site} is busy (status: {reading})")]
    SiteBusy { site: SiteId, reading: StatusReading },

    #[error("site {site} has no transport configured")]
    NoTransportConfigured { site: SiteId },

    #[error("site {site} uses transport '{transport_type}', which is not registered")]
    UnknownTransportType { site: SiteId, transport_type: String },

    #[error("site {site} returned no posts")]
    EmptyFetchResult { site: SiteId },

    #[error("fetch for site {site} did not finish within {deadline:?}")]
    FetchTimedOut { site: SiteId, deadline: Duration },

    #[error("fetch for site {site} failed: {source}")]
    Transport {
        site: SiteId,
        #[source]
        source: TransportError,
    },

    #[error("site config error: {0}")]
    Config(#[from] RegistryError),

    #[error("status store error: {0}")]
    Status(#[from] StatusError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl From<GateError> for PullError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Busy { site, reading } => PullError::SiteBusy { site, reading },
            GateError::Store(e) => PullError::Status(e),
        }
    }
}

/// Convenience constructor for [`StatusError::Io`].
pub(crate) fn status_io(path: impl Into<PathBuf>, source: std::io::Error) -> StatusError {
    StatusError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
