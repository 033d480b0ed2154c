//! Transport clients and the registry that maps a site's configured
//! transport type to an implementation.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use syndicate_core::Post;

use crate::context::SiteContext;
use crate::error::TransportError;

/// Site setting read by [`FileTransport`].
pub const SOURCE_SETTING: &str = "source";

/// Fetches the current batch of posts for a site. Network I/O, parsing and
/// authentication are entirely the implementation's business.
pub trait Transport: Send + Sync {
    fn fetch(&self, ctx: &SiteContext) -> Result<Vec<Post>, TransportError>;
}

/// Transport type → client. Populated before pulls start and only read
/// while they run.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    clients: HashMap<String, Arc<dyn Transport>>,
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the transports shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FileTransport::KIND, Arc::new(FileTransport));
        registry
    }

    /// Register `client` under `kind` (matched case-insensitively), returning
    /// any client it replaces.
    pub fn register(
        &mut self,
        kind: impl AsRef<str>,
        client: Arc<dyn Transport>,
    ) -> Option<Arc<dyn Transport>> {
        self.clients.insert(normalize_kind(kind.as_ref()), client)
    }

    pub fn get_client(&self, kind: &str) -> Option<Arc<dyn Transport>> {
        self.clients.get(&normalize_kind(kind)).cloned()
    }

    /// Registered transport types, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

fn normalize_kind(kind: &str) -> String {
    kind.trim().to_ascii_lowercase()
}

/// Reads a JSON array of posts from the path in the site's `source` setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    pub const KIND: &'static str = "file";
}

impl Transport for FileTransport {
    fn fetch(&self, ctx: &SiteContext) -> Result<Vec<Post>, TransportError> {
        let path = ctx
            .setting(SOURCE_SETTING)
            .map(PathBuf::from)
            .ok_or_else(|| TransportError::MissingSetting {
                key: SOURCE_SETTING.to_string(),
            })?;
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| TransportError::Io { path: path.clone(), source })?;
        let posts: Vec<Post> = serde_json::from_str(&contents)?;
        tracing::debug!(
            "site {}: read {} post(s) from {}",
            ctx.site_id,
            posts.len(),
            path.display()
        );
        Ok(posts)
    }
}
