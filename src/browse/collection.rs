use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

use bson::{Bson, Document};

use super::error::{BrowseError, Operation, Result};
use super::identity::IdentityResolver;
use super::settings::BrowseSettings;
use super::table::TablePage;
use crate::document::to_canonical_text;
use crate::filter::{ParsedFilter, parse_filter};
use crate::store::{DocumentStore, FindRequest, Namespace};

/// Everything the core needs to operate on one open collection.
///
/// Cloning is cheap and clones share the write quarantine.
#[derive(Clone)]
pub struct CollectionContext {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    resolver: IdentityResolver,
    settings: Arc<BrowseSettings>,
    quarantine: Arc<Mutex<BTreeSet<String>>>,
}

impl CollectionContext {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        namespace: Namespace,
        settings: Arc<BrowseSettings>,
    ) -> Self {
        Self {
            resolver: IdentityResolver::new(settings.id_field.clone()),
            store,
            namespace,
            settings,
            quarantine: Arc::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &BrowseSettings {
        &self.settings
    }

    /// Parse filter text into a predicate, resolving a lone token as an identifier.
    pub fn filter_predicate(&self, text: &str) -> Result<Document> {
        match parse_filter(text)? {
            ParsedFilter::Predicate(predicate) => Ok(predicate),
            ParsedFilter::IdentifierToken(token) => Ok(self.resolver.lookup_predicate(&token)),
        }
    }

    pub async fn fetch_page(&self, request: &FindRequest) -> Result<TablePage> {
        let documents = self
            .store
            .find(&self.namespace, request)
            .await
            .map_err(|err| BrowseError::from_store(Operation::Fetch, err))?;
        tracing::debug!(
            namespace = %self.namespace,
            skip = request.skip,
            limit = request.limit,
            count = documents.len(),
            "Fetched page"
        );
        Ok(TablePage::build(
            documents,
            &self.resolver,
            self.settings.cell_width,
        ))
    }

    pub(crate) fn is_quarantined(&self, predicate: &Document) -> bool {
        self.quarantine_set()
            .contains(&to_canonical_text(&Bson::Document(predicate.clone())))
    }

    pub(crate) fn quarantine(&self, predicate: &Document) {
        tracing::error!(
            namespace = %self.namespace,
            predicate = %predicate,
            "Blocking writes for predicate that matches several documents"
        );
        self.quarantine_set()
            .insert(to_canonical_text(&Bson::Document(predicate.clone())));
    }

    fn quarantine_set(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.quarantine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for CollectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionContext")
            .field("namespace", &self.namespace)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
