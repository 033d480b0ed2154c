//! Maps remote post identifiers to previously created local records.

use syndicate_core::LocalId;

use crate::store::ContentStore;

/// Looks up the local record created for a remote post on an earlier pull.
pub struct IdentityResolver<'a> {
    content: &'a dyn ContentStore,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(content: &'a dyn ContentStore) -> Self {
        Self { content }
    }

    /// `None` for a blank identifier or when nothing is tagged with it.
    pub fn resolve_local_id(&self, remote_id: &str) -> Option<LocalId> {
        if remote_id.trim().is_empty() {
            return None;
        }
        let found = self.content.find_by_identifier(remote_id);
        tracing::debug!("resolved '{remote_id}' -> {found:?}");
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LocalStore, MetaStore, PrimaryPayload};
    use serde_json::json;
    use syndicate_core::SYNDICATION_IDENTIFIER_KEY;

    fn tagged_store(identifier: &str) -> (LocalStore, LocalId) {
        let store = LocalStore::in_memory();
        let id = store.commit(&PrimaryPayload::default()).unwrap();
        store
            .write(id, SYNDICATION_IDENTIFIER_KEY, &json!(identifier))
            .unwrap();
        (store, id)
    }

    #[test]
    fn resolves_tagged_record() {
        let (store, id) = tagged_store("abc");
        assert_eq!(IdentityResolver::new(&store).resolve_local_id("abc"), Some(id));
    }

    #[test]
    fn unknown_identifier_resolves_to_none() {
        let (store, _) = tagged_store("abc");
        assert_eq!(IdentityResolver::new(&store).resolve_local_id("xyz"), None);
    }

    #[test]
    fn blank_identifier_never_queries() {
        let (store, _) = tagged_store("");
        let resolver = IdentityResolver::new(&store);
        assert_eq!(resolver.resolve_local_id(""), None);
        assert_eq!(resolver.resolve_local_id("   "), None);
    }
}
