//! `syndicate pull` — fetch a site through its transport and reconcile.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use syndicate_sync::{BatchPolicy, Puller, Reconciler, TransportRegistry};

use super::{print_batch, site_id, Workspace};

/// Arguments for `syndicate pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Site id to pull.
    pub site: u64,

    /// Keep reconciling after a post fails instead of stopping.
    #[arg(long)]
    pub keep_going: bool,

    /// Abandon the transport fetch after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub deadline_secs: Option<u64>,

    /// Only fetch and list the posts; do not write to the content store.
    #[arg(long)]
    pub fetch_only: bool,
}

impl PullArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let site = site_id(self.site)?;
        let transports = TransportRegistry::with_builtin();

        let mut puller = Puller::new(&ws.sites, &ws.gate, &transports);
        if let Some(secs) = self.deadline_secs {
            puller = puller.with_deadline(Duration::from_secs(secs));
        }

        if self.fetch_only {
            let posts = puller
                .process_site(site)
                .with_context(|| format!("pull failed for site {site}"))?;
            println!("✓ site {site}: fetched {} post(s)", posts.len());
            for post in &posts {
                println!("  ·  {}", post.remote_id);
            }
            return Ok(());
        }

        let policy = if self.keep_going {
            BatchPolicy::Continue
        } else {
            BatchPolicy::FailFast
        };
        let content = ws.content()?;
        let report = puller
            .pull(site, &Reconciler::over(&content), policy)
            .with_context(|| format!("pull failed for site {site}"))?;
        print_batch(site, &report.batch);
        Ok(())
    }
}
