use std::{
    collections::BTreeMap,
    sync::{
        Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bson::{Bson, Document};

use super::{
    DocumentStore, FindRequest, Namespace, Result, StoreError, UpdateOutcome, matcher,
    send_store_request,
};

type Collections = BTreeMap<String, Vec<Document>>;

/// A document store held in memory.
///
/// Documents keep insertion order, which stands in for the store's natural order.
/// Query semantics follow the subset of operators the browser emits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    databases: Mutex<BTreeMap<String, Collections>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(
        self,
        namespace: &Namespace,
        documents: impl IntoIterator<Item = Document>,
    ) -> Self {
        self.insert_many(namespace, documents);
        self
    }

    pub fn insert_many(&self, namespace: &Namespace, documents: impl IntoIterator<Item = Document>) {
        let mut databases = self.lock();
        databases
            .entry(namespace.database.clone())
            .or_default()
            .entry(namespace.collection.clone())
            .or_default()
            .extend(documents);
    }

    /// Snapshot of a collection in natural order.
    pub fn documents(&self, namespace: &Namespace) -> Vec<Document> {
        self.lock()
            .get(&namespace.database)
            .and_then(|collections| collections.get(&namespace.collection))
            .cloned()
            .unwrap_or_default()
    }

    /// While offline every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Collections>> {
        // A poisoned lock only means a test panicked mid-write; the map is still usable.
        self.databases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store is offline".into()));
        }
        Ok(())
    }

    fn with_collection<T>(
        &self,
        namespace: &Namespace,
        f: impl FnOnce(&mut Vec<Document>) -> Result<T>,
    ) -> Result<T> {
        self.check_online()?;
        let mut databases = self.lock();
        let collection = databases
            .entry(namespace.database.clone())
            .or_default()
            .entry(namespace.collection.clone())
            .or_default();
        f(collection)
    }

    fn position(documents: &[Document], predicate: &Document) -> Result<Option<usize>> {
        for (index, document) in documents.iter().enumerate() {
            if matcher::matches(document, predicate)? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_databases(&self) -> Result<Vec<String>> {
        self.check_online()?;
        Ok(self.lock().keys().cloned().collect())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        self.check_online()?;
        Ok(self
            .lock()
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn find(&self, namespace: &Namespace, request: &FindRequest) -> Result<Vec<Document>> {
        let span = tracing::trace_span!("Find", store = "memory", namespace = %namespace);
        send_store_request(span, move || async move {
            self.check_online()?;
            let mut found = Vec::new();
            for document in self.documents(namespace) {
                if matcher::matches(&document, &request.filter)? {
                    found.push(document);
                }
            }
            if let Some(sort) = &request.sort {
                matcher::sort_documents(&mut found, sort)?;
            }
            let skip = usize::try_from(request.skip).unwrap_or(usize::MAX);
            let limit = match request.limit {
                0 => usize::MAX,
                n => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
            };
            Ok(found.into_iter().skip(skip).take(limit).collect())
        })
        .await
    }

    async fn find_one(
        &self,
        namespace: &Namespace,
        predicate: &Document,
    ) -> Result<Option<Document>> {
        let request = FindRequest {
            limit: 1,
            ..FindRequest::new(predicate.clone())
        };
        Ok(self.find(namespace, &request).await?.into_iter().next())
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        predicate: &Document,
        update: &Document,
    ) -> Result<UpdateOutcome> {
        let span = tracing::trace_span!("UpdateOne", store = "memory", namespace = %namespace);
        send_store_request(span, move || async move {
            self.with_collection(namespace, |documents| {
                let Some(index) = Self::position(documents, predicate)? else {
                    return Ok(UpdateOutcome::default());
                };
                let changed = matcher::apply_update(&mut documents[index], update)?;
                Ok(UpdateOutcome {
                    matched: 1,
                    modified: u64::from(changed),
                })
            })
        })
        .await
    }

    async fn replace_one(
        &self,
        namespace: &Namespace,
        predicate: &Document,
        replacement: &Document,
    ) -> Result<UpdateOutcome> {
        let span = tracing::trace_span!("ReplaceOne", store = "memory", namespace = %namespace);
        send_store_request(span, move || async move {
            if replacement.keys().any(|key| key.starts_with('$')) {
                return Err(StoreError::Rejected(
                    "replacement document must not contain update operators".into(),
                ));
            }
            self.with_collection(namespace, |documents| {
                let Some(index) = Self::position(documents, predicate)? else {
                    return Ok(UpdateOutcome::default());
                };
                let current = &documents[index];
                let id = current.get("_id").cloned().unwrap_or(Bson::Null);
                if let Some(new_id) = replacement.get("_id")
                    && *new_id != id
                {
                    return Err(StoreError::Rejected(
                        "the _id field is immutable".to_string(),
                    ));
                }
                let mut next = Document::new();
                next.insert("_id", id);
                for (key, value) in replacement {
                    if key != "_id" {
                        next.insert(key.clone(), value.clone());
                    }
                }
                let modified = u64::from(next != *current);
                documents[index] = next;
                Ok(UpdateOutcome {
                    matched: 1,
                    modified,
                })
            })
        })
        .await
    }

    async fn delete_one(&self, namespace: &Namespace, predicate: &Document) -> Result<u64> {
        let span = tracing::trace_span!("DeleteOne", store = "memory", namespace = %namespace);
        send_store_request(span, move || async move {
            self.with_collection(namespace, |documents| {
                match Self::position(documents, predicate)? {
                    Some(index) => {
                        documents.remove(index);
                        Ok(1)
                    }
                    None => Ok(0),
                }
            })
        })
        .await
    }
}
