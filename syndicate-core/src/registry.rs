//! Per-site YAML configuration registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.syndicate/
//!   sites/
//!     <site_id>.yaml   (one file per site — mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)` — explicit home; used in tests with `TempDir`
//! - `fn(…)` — derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::RegistryError;
use crate::types::{Site, SiteId};

/// Config key that names the transport used to pull a site.
pub const TRANSPORT_TYPE_KEY: &str = "transport_type";

// ---------------------------------------------------------------------------
// 1. Config lookup seam
// ---------------------------------------------------------------------------

/// Read access to per-site configuration, as consumed by the pull orchestrator.
pub trait SiteConfigStore {
    /// Look up one configuration value. `Ok(None)` when the site has no such key.
    fn get_config(&self, site: SiteId, key: &str) -> Result<Option<String>, RegistryError>;

    /// All transport settings for a site, handed to the transport on fetch.
    fn settings(&self, site: SiteId) -> Result<BTreeMap<String, String>, RegistryError>;
}

/// [`SiteConfigStore`] backed by the YAML files under `<home>/.syndicate/sites/`.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    home: PathBuf,
}

impl SiteRegistry {
    pub fn at(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// Registry rooted at the user's home directory.
    pub fn open() -> Result<Self, RegistryError> {
        Ok(Self::at(home()?))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }
}

impl SiteConfigStore for SiteRegistry {
    fn get_config(&self, site: SiteId, key: &str) -> Result<Option<String>, RegistryError> {
        let site = load_site_at(&self.home, site)?;
        Ok(match key {
            TRANSPORT_TYPE_KEY => site.transport_type,
            "name" => Some(site.name),
            other => site.settings.get(other).cloned(),
        })
    }

    fn settings(&self, site: SiteId) -> Result<BTreeMap<String, String>, RegistryError> {
        Ok(load_site_at(&self.home, site)?.settings)
    }
}

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.syndicate/sites/`
pub fn sites_dir_at(home: &Path) -> PathBuf {
    home.join(".syndicate").join("sites")
}

/// `<home>/.syndicate/sites/<site>.yaml` — pure, no I/O.
pub fn site_path_at(home: &Path, site: SiteId) -> PathBuf {
    sites_dir_at(home).join(format!("{site}.yaml"))
}

fn ensure_sites_dir(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = sites_dir_at(home);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

// ---------------------------------------------------------------------------
// 3. Load
// ---------------------------------------------------------------------------

/// Load a single site from `<home>/.syndicate/sites/<site>.yaml`.
///
/// Returns `RegistryError::SiteNotFound` if absent,
/// `RegistryError::Parse` (with path + line context) if malformed YAML.
pub fn load_site_at(home: &Path, site: SiteId) -> Result<Site, RegistryError> {
    if !site.is_valid() {
        return Err(RegistryError::InvalidSite);
    }
    let path = site_path_at(home, site);
    if !path.exists() {
        return Err(RegistryError::SiteNotFound { site });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// `load_site_at` convenience wrapper.
pub fn load_site(site: SiteId) -> Result<Site, RegistryError> {
    load_site_at(&home()?, site)
}

/// Every registered site, sorted by id. Skips stray non-YAML files.
pub fn list_sites_at(home: &Path) -> Result<Vec<Site>, RegistryError> {
    let dir = sites_dir_at(home);
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut sites = Vec::new();
    for entry in std::fs::read_dir(&dir)?.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(&path)?;
        let site: Site = serde_yaml::from_str(&contents)
            .map_err(|e| RegistryError::Parse { path: path.clone(), source: e })?;
        sites.push(site);
    }
    sites.sort_by_key(|s| s.id);
    Ok(sites)
}

/// `list_sites_at` convenience wrapper.
pub fn list_sites() -> Result<Vec<Site>, RegistryError> {
    list_sites_at(&home()?)
}

// ---------------------------------------------------------------------------
// 4. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a site to `<home>/.syndicate/sites/<id>.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_site_at(home: &Path, site: &Site) -> Result<(), RegistryError> {
    if !site.id.is_valid() {
        return Err(RegistryError::InvalidSite);
    }
    ensure_sites_dir(home)?;
    let path = site_path_at(home, site.id);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", site.id));

    let yaml = serde_yaml::to_string(site)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Add
// ---------------------------------------------------------------------------

/// Register a site.
///
/// Idempotent: if the site file already exists, loads and returns it unchanged.
pub fn add_site_at(
    home: &Path,
    id: SiteId,
    name: impl Into<String>,
    transport_type: Option<String>,
    settings: BTreeMap<String, String>,
) -> Result<Site, RegistryError> {
    if !id.is_valid() {
        return Err(RegistryError::InvalidSite);
    }
    if site_path_at(home, id).exists() {
        return load_site_at(home, id);
    }

    let now = Utc::now();
    let site = Site {
        id,
        name: name.into(),
        transport_type,
        settings,
        created_at: now,
        updated_at: now,
    };
    save_site_at(home, &site)?;
    Ok(site)
}

/// `add_site_at` convenience wrapper.
pub fn add_site(
    id: SiteId,
    name: impl Into<String>,
    transport_type: Option<String>,
    settings: BTreeMap<String, String>,
) -> Result<Site, RegistryError> {
    add_site_at(&home()?, id, name, transport_type, settings)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
