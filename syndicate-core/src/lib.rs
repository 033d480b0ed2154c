//! Syndicate core library — domain types, site registry persistence, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes, [`Post`], [`SiteStatus`], [`Site`]
//! - [`error`] — [`RegistryError`], [`StatusParseError`]
//! - [`registry`] — per-site YAML configuration and the [`SiteConfigStore`] seam

pub mod error;
pub mod registry;
pub mod types;

pub use error::{RegistryError, StatusParseError};
pub use registry::{SiteConfigStore, SiteRegistry, TRANSPORT_TYPE_KEY};
pub use types::{
    Fields, LocalId, Metadata, Post, Site, SiteId, SiteStatus, TaxonomyAssignments,
    SYNDICATION_IDENTIFIER_KEY,
};
