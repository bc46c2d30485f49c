use crate::listings::types::{ListingQuery, Predicate};
use crate::models::ImageFile;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A schemaless document as returned by the store
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

/// Remote document collection holding listing records
///
/// Implementations are injected into the services so tests can swap in fakes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a filtered, ordered, limited query against a collection
    async fn query(&self, collection: &str, query: &ListingQuery) -> Result<Vec<StoredDocument>>;

    /// Fetch a single document, `None` if it does not exist
    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>>;

    /// Insert a new document and return its store-assigned id
    async fn insert(&self, collection: &str, data: Value) -> Result<String>;

    /// Merge `fields` into an existing document; the store stamps `updatedAt`
    ///
    /// When `precondition` is given, the store checks it against the current
    /// document and applies the merge in the same atomic step. Returns `false`
    /// without writing if the precondition does not hold.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        precondition: Option<&Predicate>,
    ) -> Result<bool>;

    /// Get the name of the store backend
    fn store_name(&self) -> &'static str;
}

/// Opaque reference to an uploaded blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub key: String,
}

/// Remote file storage for listing images
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes under a caller-chosen unique key
    async fn upload(&self, key: &str, image: &ImageFile) -> Result<BlobRef>;

    /// Resolve an uploaded blob to its public URL
    async fn public_url(&self, blob: &BlobRef) -> Result<String>;
}
