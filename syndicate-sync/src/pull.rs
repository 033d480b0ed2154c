//! Pull orchestration for a single site.
//!
//! ## Cycle
//!
//! 1. Gate check — the site must be idle or unset.
//! 2. Look up the site's transport type, then its registered client.
//! 3. Claim the site (`idle → pulling`, one compare-and-set).
//! 4. Fetch through the transport, bounded by the optional deadline.
//! 5. [`Puller::pull`] only: reconcile the fetched posts.
//! 6. Return the site to `idle` whatever happened in 4–5.

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use serde_json::Value;
use syndicate_core::{Post, RegistryError, SiteConfigStore, SiteId, SiteStatus, TRANSPORT_TYPE_KEY};

use crate::context::SiteContext;
use crate::error::{PullError, StatusError, TransportError};
use crate::reconcile::{BatchPolicy, BatchReport, Reconciler};
use crate::status::{StatusGate, StatusLease};
use crate::transport::{Transport, TransportRegistry};

/// Summary of a full pull-and-reconcile cycle.
#[derive(Debug)]
pub struct PullReport {
    pub site: SiteId,
    pub fetched: usize,
    pub batch: BatchReport,
}

/// Drives pulls for sites using the configured transport registry.
pub struct Puller<'a> {
    config: &'a dyn SiteConfigStore,
    gate: &'a StatusGate,
    transports: &'a TransportRegistry,
    deadline: Option<Duration>,
}

impl<'a> Puller<'a> {
    pub fn new(
        config: &'a dyn SiteConfigStore,
        gate: &'a StatusGate,
        transports: &'a TransportRegistry,
    ) -> Self {
        Self {
            config,
            gate,
            transports,
            deadline: None,
        }
    }

    /// Stop waiting for a transport after `deadline`. The site is still
    /// released; the abandoned fetch finishes on its own thread.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fetch the posts for `site` without reconciling them.
    pub fn process_site(&self, site: SiteId) -> Result<Vec<Post>, PullError> {
        let (lease, client, ctx) = self.begin(site)?;
        let fetched = self.fetch(client, &ctx);
        let posts = settle(site, fetched, lease.release())?;
        if posts.is_empty() {
            return Err(PullError::EmptyFetchResult { site });
        }
        tracing::info!("site {site}: fetched {} post(s)", posts.len());
        Ok(posts)
    }

    /// Fetch the posts for `site` and reconcile them while the site is held.
    pub fn pull(
        &self,
        site: SiteId,
        reconciler: &Reconciler<'_>,
        policy: BatchPolicy,
    ) -> Result<PullReport, PullError> {
        let (lease, client, ctx) = self.begin(site)?;
        let outcome = self.fetch(client, &ctx).and_then(|posts| {
            if posts.is_empty() {
                return Err(PullError::EmptyFetchResult { site });
            }
            let batch = reconciler.process_posts(&posts, &ctx, policy)?;
            Ok((posts.len(), batch))
        });
        let (fetched, batch) = settle(site, outcome, lease.release())?;
        tracing::info!(
            "site {site}: pulled {fetched} post(s) ({} created, {} updated, {} failed)",
            batch.created(),
            batch.updated(),
            batch.failures.len()
        );
        Ok(PullReport {
            site,
            fetched,
            batch,
        })
    }

    /// Steps 1–3. Nothing is written unless every check passes.
    fn begin(
        &self,
        site: SiteId,
    ) -> Result<(StatusLease, Arc<dyn Transport>, SiteContext), PullError> {
        let ctx = SiteContext::new(site);

        let reading = self.gate.get_status(site);
        if !reading.allows_pull() {
            return Err(PullError::SiteBusy { site, reading });
        }

        let transport_type = match self.config.get_config(site, TRANSPORT_TYPE_KEY) {
            Ok(Some(t)) if !t.trim().is_empty() => t,
            Ok(_) | Err(RegistryError::SiteNotFound { .. }) => {
                return Err(PullError::NoTransportConfigured { site })
            }
            Err(e) => return Err(e.into()),
        };
        let client = self.transports.get_client(&transport_type).ok_or_else(|| {
            PullError::UnknownTransportType {
                site,
                transport_type: transport_type.clone(),
            }
        })?;
        let ctx = ctx
            .with_settings(self.config.settings(site)?)
            .with_transport(transport_type);

        let lease = self.gate.acquire(site, SiteStatus::Pulling)?;
        Ok((lease, client, ctx))
    }

    fn fetch(&self, client: Arc<dyn Transport>, ctx: &SiteContext) -> Result<Vec<Post>, PullError> {
        let site = ctx.site_id;
        let transport_err = |source: TransportError| PullError::Transport { site, source };

        let Some(deadline) = self.deadline else {
            return client.fetch(ctx).map_err(transport_err);
        };

        let (tx, rx) = mpsc::channel();
        let worker_ctx = ctx.clone();
        thread::Builder::new()
            .name(format!("syndicate-fetch-{site}"))
            .spawn(move || {
                let _ = tx.send(client.fetch(&worker_ctx));
            })
            .map_err(|e| transport_err(TransportError::Worker(e)))?;

        match rx.recv_timeout(deadline) {
            Ok(result) => result.map_err(transport_err),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!("site {site}: fetch exceeded {deadline:?}, abandoning it");
                Err(PullError::FetchTimedOut { site, deadline })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(transport_err(TransportError::WorkerLost))
            }
        }
    }
}

/// Reconcile a raw JSON batch for `ctx.site_id` while the site is held in
/// `processing`. The site goes back to idle whatever the batch does.
pub fn import_batch(
    gate: &StatusGate,
    reconciler: &Reconciler<'_>,
    raw: &Value,
    ctx: &SiteContext,
    policy: BatchPolicy,
) -> Result<BatchReport, PullError> {
    let site = ctx.site_id;
    let lease = gate.acquire(site, SiteStatus::Processing)?;
    let outcome = reconciler
        .process_json(raw, ctx, policy)
        .map_err(PullError::from);
    let batch = settle(site, outcome, lease.release())?;
    tracing::info!(
        "site {site}: imported {} post(s) ({} failed)",
        batch.outcomes.len(),
        batch.failures.len()
    );
    Ok(batch)
}

/// Combine the work's outcome with the lease release. A work error wins;
/// a release failure behind it is logged rather than lost.
pub(crate) fn settle<T>(
    site: SiteId,
    outcome: Result<T, PullError>,
    released: Result<(), StatusError>,
) -> Result<T, PullError> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(release)) => Err(release.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release)) => {
            tracing::warn!("site {site}: release after failure also failed: {release}");
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
