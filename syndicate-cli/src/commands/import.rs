//! `syndicate import` — reconcile a JSON batch from disk for a site.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use syndicate_core::{RegistryError, SiteConfigStore, TRANSPORT_TYPE_KEY};
use syndicate_sync::{import_batch, BatchPolicy, Reconciler, SiteContext};

use super::{print_batch, site_id, Workspace};

/// Arguments for `syndicate import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Site the posts are attributed to.
    pub site: u64,

    /// JSON file holding an array of posts.
    pub file: PathBuf,

    /// Keep reconciling after a post fails instead of stopping.
    #[arg(long)]
    pub keep_going: bool,
}

impl ImportArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let site = site_id(self.site)?;

        let raw = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let batch: Value = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", self.file.display()))?;

        let mut ctx = SiteContext::new(site);
        match ws.sites.get_config(site, TRANSPORT_TYPE_KEY) {
            Ok(transport) => {
                ctx.transport_type = transport;
                ctx.settings = ws.sites.settings(site)?;
            }
            Err(RegistryError::SiteNotFound { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let policy = if self.keep_going {
            BatchPolicy::Continue
        } else {
            BatchPolicy::FailFast
        };
        let content = ws.content()?;
        let report = import_batch(&ws.gate, &Reconciler::over(&content), &batch, &ctx, policy)
            .with_context(|| format!("import failed for site {site}"))?;
        print_batch(site, &report);
        Ok(())
    }
}
