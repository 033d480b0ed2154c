//! Domain types for syndicated content and the sites it is pulled from.
//!
//! All types are serializable via serde: sites persist as YAML, posts travel
//! as JSON between transports and the reconciler.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StatusParseError;

/// Metadata key holding the remote identifier of a syndicated post.
///
/// The local store looks records up by this key to map a remote post back to
/// the record created for it on an earlier pull.
pub const SYNDICATION_IDENTIFIER_KEY: &str = "syn_identifier";

/// Primary record attributes (title, body, status, timestamps, ...).
pub type Fields = BTreeMap<String, Value>;

/// Auxiliary key/value pairs attached to a local record.
pub type Metadata = BTreeMap<String, Value>;

/// Taxonomy name → term names to attach to a local record.
pub type TaxonomyAssignments = BTreeMap<String, BTreeSet<String>>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Internal identifier of a configured remote site. Zero means "no site".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl SiteId {
    /// `false` for the reserved zero id.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for SiteId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of a record in the local content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(pub u64);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for LocalId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Site status
// ---------------------------------------------------------------------------

/// Durable per-site activity flag observed by the status gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    #[default]
    Idle,
    Pulling,
    Pushing,
    Processing,
}

impl SiteStatus {
    pub const ALL: [SiteStatus; 4] = [
        SiteStatus::Idle,
        SiteStatus::Pulling,
        SiteStatus::Pushing,
        SiteStatus::Processing,
    ];

    /// Slug form persisted in the status store.
    pub fn as_str(self) -> &'static str {
        match self {
            SiteStatus::Idle => "idle",
            SiteStatus::Pulling => "pulling",
            SiteStatus::Pushing => "pushing",
            SiteStatus::Processing => "processing",
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteStatus {
    type Err = StatusParseError;

    /// Case-insensitive; the input is reduced to slug form first, so
    /// `" Pulling "` and `"PULLING"` both parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slug = slugify(s);
        if slug.is_empty() {
            return Err(StatusParseError::Empty);
        }
        SiteStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == slug)
            .ok_or(StatusParseError::Unknown(slug))
    }
}

/// Lowercase, map whitespace and `_` to `-`, drop anything else that is not
/// alphanumeric, and collapse repeated separators.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '_' || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// One syndicated content item in transit between a remote site and the
/// local store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Post {
    /// Opaque identifier assigned by the remote source.
    #[serde(default)]
    pub remote_id: String,
    /// Local record id; absent until resolved or assigned on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<LocalId>,
    #[serde(default)]
    pub primary_fields: Fields,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub taxonomy_assignments: TaxonomyAssignments,
}

impl Post {
    pub fn new(remote_id: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            ..Self::default()
        }
    }

    pub fn with_local_id(mut self, id: LocalId) -> Self {
        self.local_id = Some(id);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.primary_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_terms<I, T>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.taxonomy_assignments
            .entry(taxonomy.into())
            .or_default()
            .extend(terms.into_iter().map(Into::into));
        self
    }
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

/// A configured remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    /// Key into the transport registry (`file`, `rss`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_type: Option<String>,
    /// Transport-specific settings, e.g. `source` for the file transport.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
