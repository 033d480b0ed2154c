//! Provenance passed explicitly to transports and commit hooks.

use std::collections::BTreeMap;

use syndicate_core::SiteId;

/// The site an operation is running for, with its transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteContext {
    pub site_id: SiteId,
    pub transport_type: Option<String>,
    pub settings: BTreeMap<String, String>,
}

impl SiteContext {
    pub fn new(site_id: SiteId) -> Self {
        Self {
            site_id,
            transport_type: None,
            settings: BTreeMap::new(),
        }
    }

    pub fn with_transport(mut self, transport_type: impl Into<String>) -> Self {
        self.transport_type = Some(transport_type.into());
        self
    }

    pub fn with_settings(mut self, settings: BTreeMap<String, String>) -> Self {
        self.settings = settings;
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}
