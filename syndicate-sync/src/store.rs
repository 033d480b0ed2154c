//! Local content store seams and the JSON document store behind them.
//!
//! The reconciler only talks to the three traits. [`LocalStore`] implements
//! all of them over a single JSON document at `<home>/.syndicate/content.json`,
//! written with the same `.tmp` + rename pattern as the site registry.
//!
//! Several handles (and processes) may share one document. Every mutation
//! holds `content.json.lock`, re-reads the document, applies the change and
//! saves it; reads always start from the saved document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use syndicate_core::{Fields, LocalId, Metadata, TaxonomyAssignments, SYNDICATION_IDENTIFIER_KEY};

use crate::error::{store_io, StoreError};
use crate::lock::LockFile;

/// Write payload for a primary record. `local_id` set means update.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrimaryPayload {
    pub local_id: Option<LocalId>,
    pub fields: Fields,
}

/// Primary records.
pub trait ContentStore {
    fn exists(&self, id: LocalId) -> bool;

    /// Insert (no `local_id`) or update (with `local_id`), returning the id
    /// of the written record.
    fn commit(&self, payload: &PrimaryPayload) -> Result<LocalId, StoreError>;

    /// The record tagged with this syndication identifier, if any. At most
    /// one match is considered.
    fn find_by_identifier(&self, identifier: &str) -> Option<LocalId>;
}

/// Key/value pairs attached to a record.
pub trait MetaStore {
    fn write(&self, id: LocalId, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// Term assignments attached to a record.
pub trait TaxonomyStore {
    /// Replace the record's terms for `taxonomy` with `terms`.
    fn assign(&self, id: LocalId, taxonomy: &str, terms: &BTreeSet<String>)
        -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// LocalStore
// ---------------------------------------------------------------------------

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    pub id: LocalId,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub terms: TaxonomyAssignments,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ContentDocument {
    #[serde(default)]
    last_id: u64,
    #[serde(default)]
    records: BTreeMap<u64, LocalRecord>,
}

impl ContentDocument {
    fn record_mut(&mut self, id: LocalId) -> Result<&mut LocalRecord, StoreError> {
        self.records.get_mut(&id.0).ok_or(StoreError::NotFound { id })
    }
}

/// JSON document store implementing [`ContentStore`], [`MetaStore`] and
/// [`TaxonomyStore`]. In-memory when opened with [`LocalStore::in_memory`].
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    doc: Mutex<ContentDocument>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            doc: Mutex::new(ContentDocument::default()),
        }
    }

    /// `<home>/.syndicate/content.json` — pure, no I/O.
    pub fn path_at(home: &Path) -> PathBuf {
        home.join(".syndicate").join("content.json")
    }

    /// Open the store under `home`, starting empty if the file does not exist.
    pub fn open_at(home: &Path) -> Result<Self, StoreError> {
        let path = Self::path_at(home);
        let doc = load(&path)?;
        Ok(Self {
            path: Some(path),
            doc: Mutex::new(doc),
        })
    }

    pub fn record(&self, id: LocalId) -> Option<LocalRecord> {
        self.current().records.get(&id.0).cloned()
    }

    pub fn records(&self) -> Vec<LocalRecord> {
        self.current().records.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.current().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn doc(&self) -> MutexGuard<'_, ContentDocument> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The saved document, refreshed into this handle. Keeps the cached copy
    /// when the file cannot be read.
    fn current(&self) -> MutexGuard<'_, ContentDocument> {
        let mut guard = self.doc();
        if let Some(path) = &self.path {
            match load(path) {
                Ok(doc) => *guard = doc,
                Err(e) => tracing::warn!("content store reload failed, using cached copy: {e}"),
            }
        }
        guard
    }

    /// Apply `f` to the latest saved document under the store lock, persist
    /// it, then publish it. A failed mutation or save leaves the store untouched.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut ContentDocument) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _lock = match &self.path {
            Some(path) => Some(lock(path)?),
            None => None,
        };
        let mut guard = self.doc();
        let mut next = match &self.path {
            Some(path) => load(path)?,
            None => guard.clone(),
        };
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            save(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }
}

fn load(path: &Path) -> Result<ContentDocument, StoreError> {
    if !path.exists() {
        return Ok(ContentDocument::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| store_io(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

fn lock(path: &Path) -> Result<LockFile, StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| store_io(dir, e))?;
    }
    let lock_path = path.with_extension("json.lock");
    LockFile::acquire(&lock_path)
        .map_err(|e| store_io(&lock_path, e))?
        .ok_or(StoreError::LockHeld { path: lock_path })
}

fn save(path: &Path, doc: &ContentDocument) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| store_io(dir, e))?;
    }
    let json = serde_json::to_string_pretty(doc)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| store_io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| store_io(path, e))?;
    Ok(())
}

impl ContentStore for LocalStore {
    fn exists(&self, id: LocalId) -> bool {
        self.current().records.contains_key(&id.0)
    }

    fn commit(&self, payload: &PrimaryPayload) -> Result<LocalId, StoreError> {
        self.mutate(|doc| {
            let now = Utc::now();
            if let Some(id) = payload.local_id {
                let record = doc.record_mut(id)?;
                record
                    .fields
                    .extend(payload.fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                record.updated_at = now;
                return Ok(id);
            }

            doc.last_id += 1;
            let id = LocalId(doc.last_id);
            doc.records.insert(
                id.0,
                LocalRecord {
                    id,
                    fields: payload.fields.clone(),
                    meta: Metadata::new(),
                    terms: TaxonomyAssignments::new(),
                    created_at: now,
                    updated_at: now,
                },
            );
            Ok(id)
        })
    }

    fn find_by_identifier(&self, identifier: &str) -> Option<LocalId> {
        self.current()
            .records
            .values()
            .find(|r| {
                r.meta.get(SYNDICATION_IDENTIFIER_KEY).and_then(Value::as_str) == Some(identifier)
            })
            .map(|r| r.id)
    }
}

impl MetaStore for LocalStore {
    fn write(&self, id: LocalId, key: &str, value: &Value) -> Result<(), StoreError> {
        self.mutate(|doc| {
            let record = doc.record_mut(id)?;
            record.meta.insert(key.to_string(), value.clone());
            record.updated_at = Utc::now();
            Ok(())
        })
    }
}

impl TaxonomyStore for LocalStore {
    fn assign(
        &self,
        id: LocalId,
        taxonomy: &str,
        terms: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        self.mutate(|doc| {
            let record = doc.record_mut(id)?;
            if terms.is_empty() {
                record.terms.remove(taxonomy);
            } else {
                record.terms.insert(taxonomy.to_string(), terms.clone());
            }
            record.updated_at = Utc::now();
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
