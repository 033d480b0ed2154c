//! # syndicate-sync
//!
//! Pull remote posts for a site and reconcile them into the local store.
//!
//! - [`status`] — per-site status gate with atomic claim/release
//! - [`identity`] — remote id → local record lookup
//! - [`store`] — local content/metadata/taxonomy seams and [`LocalStore`]
//! - [`hooks`] — pre-commit transforms
//! - [`reconcile`] — per-post commit sequence and batch processing
//! - [`transport`] — transport clients and their registry
//! - [`pull`] — the orchestrated pull cycle and held batch imports

pub mod context;
pub mod error;
pub mod hooks;
pub mod identity;
mod lock;
pub mod pull;
pub mod reconcile;
pub mod status;
pub mod store;
pub mod transport;

pub use context::SiteContext;
pub use error::{GateError, PullError, ReconcileError, StatusError, StoreError, TransportError};
pub use hooks::{CommitHooks, NoHooks};
pub use identity::IdentityResolver;
pub use pull::{import_batch, PullReport, Puller};
pub use reconcile::{
    decode_batch, BatchFailure, BatchPolicy, BatchReport, ReconcileAction, ReconcileOutcome,
    Reconciler,
};
pub use status::{
    FileStatusStore, MemoryStatusStore, StatusGate, StatusLease, StatusReading, StatusStore,
};
pub use store::{ContentStore, LocalRecord, LocalStore, MetaStore, PrimaryPayload, TaxonomyStore};
pub use transport::{FileTransport, Transport, TransportRegistry};
