//! Document store collaborator.
//!
//! The browsing core only talks to a [`DocumentStore`]. [`MongoStore`] is the
//! production adapter and [`MemoryStore`] evaluates the same predicates in process.

mod debug;
mod matcher;
pub mod memory;
pub mod mongo;

use std::fmt;

use async_trait::async_trait;
use bson::Document;

pub use debug::send_store_request;
pub use memory::MemoryStore;
pub use mongo::{ConnectOptions, MongoStore, redact_uri};

/// The store enforces a unique index on this field in every collection.
pub const PRIMARY_KEY: &str = "_id";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
    pub filter: Document,
    pub sort: Option<Document>,
    pub skip: u64,
    /// Zero means no limit.
    pub limit: i64,
}

impl FindRequest {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            sort: None,
            skip: 0,
            limit: 0,
        }
    }

    /// Enough to tell "exactly one" apart from "more than one".
    pub fn probe(predicate: Document) -> Self {
        Self {
            limit: 2,
            ..Self::new(predicate)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or dropped the connection.
    #[error("connection error: {0}")]
    Connection(String),
    /// The store refused to run the query because the predicate or sort was malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("rejected by store: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>>;

    async fn list_collections(&self, database: &str) -> Result<Vec<String>>;

    async fn find(&self, namespace: &Namespace, request: &FindRequest) -> Result<Vec<Document>>;

    async fn find_one(&self, namespace: &Namespace, predicate: &Document)
    -> Result<Option<Document>>;

    /// `update` is an update document such as `{"$set": {...}}`.
    async fn update_one(
        &self,
        namespace: &Namespace,
        predicate: &Document,
        update: &Document,
    ) -> Result<UpdateOutcome>;

    async fn replace_one(
        &self,
        namespace: &Namespace,
        predicate: &Document,
        replacement: &Document,
    ) -> Result<UpdateOutcome>;

    /// Returns the number of deleted documents.
    async fn delete_one(&self, namespace: &Namespace, predicate: &Document) -> Result<u64>;
}
