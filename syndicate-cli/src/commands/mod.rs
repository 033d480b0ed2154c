pub mod import;
pub mod pull;
pub mod site;
pub mod status;

use std::sync::Arc;

use anyhow::{Context, Result};
use syndicate_core::{SiteId, SiteRegistry};
use syndicate_sync::{
    BatchReport, FileStatusStore, LocalStore, ReconcileAction, StatusGate,
};

/// Durable state under the user's home directory.
pub struct Workspace {
    pub sites: SiteRegistry,
    pub status: Arc<FileStatusStore>,
    pub gate: StatusGate,
}

impl Workspace {
    pub fn open() -> Result<Self> {
        let sites = SiteRegistry::open().context("could not determine home directory")?;
        let status = Arc::new(FileStatusStore::at(sites.home()));
        Ok(Self {
            gate: StatusGate::new(status.clone()),
            status,
            sites,
        })
    }

    pub fn content(&self) -> Result<LocalStore> {
        LocalStore::open_at(self.sites.home()).context("failed to open local content store")
    }
}

pub fn site_id(raw: u64) -> Result<SiteId> {
    let id = SiteId(raw);
    anyhow::ensure!(id.is_valid(), "site id must be greater than 0");
    Ok(id)
}

pub fn print_batch(site: SiteId, batch: &BatchReport) {
    println!(
        "✓ site {site}: {} created, {} updated, {} failed",
        batch.created(),
        batch.updated(),
        batch.failures.len()
    );
    for outcome in &batch.outcomes {
        let marker = match outcome.action {
            ReconcileAction::Created => "+",
            ReconcileAction::Updated => "✎",
        };
        println!("  {marker}  {} → #{}", outcome.remote_id, outcome.local_id);
    }
    for failure in &batch.failures {
        println!("  ✗  #{} {}: {}", failure.index, failure.remote_id, failure.error);
    }
}
