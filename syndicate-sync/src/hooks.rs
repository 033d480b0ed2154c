//! Pre-commit transforms.
//!
//! Each commit stage of the reconciler passes its payload through one hook
//! before writing. Implementors override only the stages they care about;
//! the defaults return the payload unchanged.

use syndicate_core::{Metadata, TaxonomyAssignments};

use crate::context::SiteContext;
use crate::store::PrimaryPayload;

pub trait CommitHooks {
    fn before_primary(&self, payload: PrimaryPayload, _ctx: &SiteContext) -> PrimaryPayload {
        payload
    }

    fn before_metadata(&self, metadata: Metadata, _ctx: &SiteContext) -> Metadata {
        metadata
    }

    fn before_taxonomy(
        &self,
        assignments: TaxonomyAssignments,
        _ctx: &SiteContext,
    ) -> TaxonomyAssignments {
        assignments
    }
}

/// Identity hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl CommitHooks for NoHooks {}
