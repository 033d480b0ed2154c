//! Post reconciliation — applies pulled posts to the local store.
//!
//! ## Per-post sequence
//!
//! 1. Resolve `local_id` from the remote id when the post has none.
//! 2. A set `local_id` must name an existing record; otherwise stop before
//!    any write.
//! 3. Commit primary fields (insert, or update when `local_id` is set).
//! 4. Write each metadata pair.
//! 5. Replace term assignments per taxonomy.
//!
//! Each stage runs its payload through the matching [`CommitHooks`] method
//! first. The first failing stage aborts the post; stages that already
//! committed stay committed.

use serde::Deserialize;
use serde_json::Value;

use syndicate_core::{LocalId, Post, SYNDICATION_IDENTIFIER_KEY};

use crate::context::SiteContext;
use crate::error::ReconcileError;
use crate::hooks::{CommitHooks, NoHooks};
use crate::identity::IdentityResolver;
use crate::store::{ContentStore, MetaStore, PrimaryPayload, TaxonomyStore};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Created,
    Updated,
}

/// What happened to one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub remote_id: String,
    pub local_id: LocalId,
    pub action: ReconcileAction,
}

/// How a batch reacts to a failing post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Stop at the first failure and return it.
    #[default]
    FailFast,
    /// Record the failure and move on to the next post.
    Continue,
}

/// A post that failed under [`BatchPolicy::Continue`].
#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub remote_id: String,
    pub error: ReconcileError,
}

/// Outcome of reconciling a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ReconcileOutcome>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn created(&self) -> usize {
        self.count(ReconcileAction::Created)
    }

    pub fn updated(&self) -> usize {
        self.count(ReconcileAction::Updated)
    }

    fn count(&self, action: ReconcileAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Applies posts to the local content, metadata and taxonomy stores.
pub struct Reconciler<'a> {
    content: &'a dyn ContentStore,
    meta: &'a dyn MetaStore,
    taxonomy: &'a dyn TaxonomyStore,
    hooks: &'a dyn CommitHooks,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        content: &'a dyn ContentStore,
        meta: &'a dyn MetaStore,
        taxonomy: &'a dyn TaxonomyStore,
    ) -> Self {
        Self {
            content,
            meta,
            taxonomy,
            hooks: &NoHooks,
        }
    }

    /// Reconciler over a single store implementing all three seams.
    pub fn over<S>(store: &'a S) -> Self
    where
        S: ContentStore + MetaStore + TaxonomyStore,
    {
        Self::new(store, store, store)
    }

    pub fn with_hooks(mut self, hooks: &'a dyn CommitHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Reconcile one post.
    pub fn reconcile(
        &self,
        post: &Post,
        ctx: &SiteContext,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let remote_id = post.remote_id.as_str();

        // 1. identity
        let local_id = post
            .local_id
            .or_else(|| IdentityResolver::new(self.content).resolve_local_id(remote_id));

        // 2. existence
        if let Some(id) = local_id {
            if !self.content.exists(id) {
                return Err(ReconcileError::MissingLocalRecord {
                    remote_id: remote_id.to_string(),
                    local_id: id,
                });
            }
        }

        // 3. primary fields
        let payload = self.hooks.before_primary(
            PrimaryPayload {
                local_id,
                fields: post.primary_fields.clone(),
            },
            ctx,
        );
        let action = if payload.local_id.is_some() {
            ReconcileAction::Updated
        } else {
            ReconcileAction::Created
        };
        let id = self
            .content
            .commit(&payload)
            .map_err(|source| ReconcileError::PrimaryCommitFailed {
                remote_id: remote_id.to_string(),
                source,
            })?;
        tracing::debug!("site {}: '{remote_id}' primary commit -> {id}", ctx.site_id);

        // 4. metadata
        let mut metadata = post.metadata.clone();
        if !remote_id.trim().is_empty() {
            metadata
                .entry(SYNDICATION_IDENTIFIER_KEY.to_string())
                .or_insert_with(|| Value::String(remote_id.to_string()));
        }
        let metadata = self.hooks.before_metadata(metadata, ctx);
        for (key, value) in &metadata {
            self.meta
                .write(id, key, value)
                .map_err(|source| ReconcileError::MetadataWriteFailed {
                    local_id: id,
                    key: key.clone(),
                    source,
                })?;
        }

        // 5. taxonomy
        let assignments = self
            .hooks
            .before_taxonomy(post.taxonomy_assignments.clone(), ctx);
        for (taxonomy, terms) in &assignments {
            self.taxonomy.assign(id, taxonomy, terms).map_err(|source| {
                ReconcileError::TaxonomyWriteFailed {
                    local_id: id,
                    taxonomy: taxonomy.clone(),
                    source,
                }
            })?;
        }

        match action {
            ReconcileAction::Created => {
                tracing::info!("site {}: created record {id} for '{remote_id}'", ctx.site_id)
            }
            ReconcileAction::Updated => {
                tracing::info!("site {}: updated record {id} for '{remote_id}'", ctx.site_id)
            }
        }
        Ok(ReconcileOutcome {
            remote_id: remote_id.to_string(),
            local_id: id,
            action,
        })
    }

    /// Reconcile posts in order.
    ///
    /// Under [`BatchPolicy::FailFast`] the first failure is returned and later
    /// posts are not touched. Under [`BatchPolicy::Continue`] failures are
    /// collected in the report.
    pub fn process_posts(
        &self,
        posts: &[Post],
        ctx: &SiteContext,
        policy: BatchPolicy,
    ) -> Result<BatchReport, ReconcileError> {
        let mut report = BatchReport::default();
        for (index, post) in posts.iter().enumerate() {
            match self.reconcile(post, ctx) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(error) if policy == BatchPolicy::Continue => {
                    tracing::warn!("site {}: post #{index} failed: {error}", ctx.site_id);
                    report.failures.push(BatchFailure {
                        index,
                        remote_id: post.remote_id.clone(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(report)
    }

    /// Decode a raw JSON batch and reconcile it. Nothing is written when the
    /// input is not an array of posts.
    pub fn process_json(
        &self,
        raw: &Value,
        ctx: &SiteContext,
        policy: BatchPolicy,
    ) -> Result<BatchReport, ReconcileError> {
        let posts = decode_batch(raw)?;
        self.process_posts(&posts, ctx, policy)
    }
}

/// Decode a JSON array of posts, rejecting the whole batch on the first bad item.
pub fn decode_batch(raw: &Value) -> Result<Vec<Post>, ReconcileError> {
    let Some(items) = raw.as_array() else {
        return Err(ReconcileError::InvalidBatchInput(format!(
            "expected an array of posts, got {}",
            json_kind(raw)
        )));
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            Post::deserialize(item)
                .map_err(|e| ReconcileError::InvalidBatchInput(format!("post #{index}: {e}")))
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
