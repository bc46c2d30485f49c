//! In-memory document and blob stores.
//!
//! Used by the demo binary and by tests. Both stores share state across
//! clones, can simulate backend failures and count the calls they receive.

use crate::listings::traits::{BlobRef, BlobStore, DocumentStore, StoredDocument};
use crate::listings::types::{compare_values, fields, ListingQuery, Predicate, SortDirection};
use crate::models::ImageFile;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Types of failures that can be simulated.
#[derive(Debug, Clone, PartialEq)]
pub enum MockStoreFailure {
    /// Fail all operations.
    All,
    /// Fail only read operations.
    Reads,
    /// Fail only write operations.
    Writes,
}

#[derive(Debug, Default)]
struct MemoryDocumentInner {
    collections: RwLock<HashMap<String, Vec<StoredDocument>>>,
    fail_mode: RwLock<Option<MockStoreFailure>>,
    last_query: Mutex<Option<ListingQuery>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

/// Document store backed by a map of collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<MemoryDocumentInner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a document in place without counting it as a write.
    pub async fn seed(&self, collection: &str, id: &str, data: Value) {
        let mut collections = self.inner.collections.write().await;
        let documents = collections.entry(collection.to_string()).or_default();
        documents.retain(|doc| doc.id != id);
        documents.push(StoredDocument {
            id: id.to_string(),
            data,
        });
    }

    pub async fn set_fail_mode(&self, mode: Option<MockStoreFailure>) {
        *self.inner.fail_mode.write().await = mode;
    }

    /// Number of read calls (query and get) received
    pub fn read_count(&self) -> usize {
        self.inner.reads.load(AtomicOrdering::SeqCst)
    }

    /// Number of write calls (insert and update) received
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(AtomicOrdering::SeqCst)
    }

    pub async fn last_query(&self) -> Option<ListingQuery> {
        self.inner.last_query.lock().await.clone()
    }

    pub async fn document_count(&self, collection: &str) -> usize {
        self.inner
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, Vec::len)
    }

    async fn check_read(&self) -> Result<()> {
        self.inner.reads.fetch_add(1, AtomicOrdering::SeqCst);
        match &*self.inner.fail_mode.read().await {
            Some(MockStoreFailure::All | MockStoreFailure::Reads) => {
                bail!("simulated read failure: unavailable")
            }
            _ => Ok(()),
        }
    }

    async fn check_write(&self) -> Result<()> {
        self.inner.writes.fetch_add(1, AtomicOrdering::SeqCst);
        match &*self.inner.fail_mode.read().await {
            Some(MockStoreFailure::All | MockStoreFailure::Writes) => {
                bail!("simulated write failure: permission denied")
            }
            _ => Ok(()),
        }
    }
}

/// Compare two documents by the ordering field, ties broken by id in the same direction.
fn compare_documents(a: &StoredDocument, b: &StoredDocument, field: &str) -> Ordering {
    let by_field = match (a.data.get(field), b.data.get(field)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    };
    by_field.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, collection: &str, query: &ListingQuery) -> Result<Vec<StoredDocument>> {
        self.check_read().await?;
        *self.inner.last_query.lock().await = Some(query.clone());

        let collections = self.inner.collections.read().await;
        let mut matched: Vec<StoredDocument> = collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| query.predicates.iter().all(|p| p.matches(&doc.data)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order_by {
            matched.sort_by(|a, b| {
                let ordering = compare_documents(a, b, &order.field);
                match order.direction {
                    SortDirection::Ascending => ordering,
                    SortDirection::Descending => ordering.reverse(),
                }
            });

            if let Some(cursor) = &query.start_after {
                let mut position = Map::new();
                position.insert(
                    order.field.clone(),
                    Value::from(cursor.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)),
                );
                let anchor = StoredDocument {
                    id: cursor.id.clone(),
                    data: Value::Object(position),
                };
                matched.retain(|doc| {
                    let ordering = compare_documents(doc, &anchor, &order.field);
                    match order.direction {
                        SortDirection::Ascending => ordering == Ordering::Greater,
                        SortDirection::Descending => ordering == Ordering::Less,
                    }
                });
            }
        }

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>> {
        self.check_read().await?;
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| doc.id == id))
            .cloned())
    }

    async fn insert(&self, collection: &str, data: Value) -> Result<String> {
        self.check_write().await?;
        if !data.is_object() {
            bail!("document must be a JSON object");
        }

        let id = Uuid::new_v4().to_string();
        let mut collections = self.inner.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                data,
            });
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields_to_set: Map<String, Value>,
        precondition: Option<&Predicate>,
    ) -> Result<bool> {
        self.check_write().await?;
        let mut collections = self.inner.collections.write().await;
        let document = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| doc.id == id))
            .ok_or_else(|| anyhow!("no document {id} in {collection}"))?;

        // Checked under the write lock so no other update slips in between
        if precondition.is_some_and(|p| !p.matches(&document.data)) {
            return Ok(false);
        }

        let object = document
            .data
            .as_object_mut()
            .ok_or_else(|| anyhow!("document {id} is not an object"))?;
        object.extend(fields_to_set);
        object.insert(
            fields::UPDATED_AT.to_string(),
            Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
        );
        Ok(true)
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[derive(Debug, Default)]
struct MemoryBlobInner {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    /// Upload calls that should fail, counted from zero in call order
    failing_calls: RwLock<Vec<usize>>,
    /// Artificial latency handed out to uploads in call order
    delays: Mutex<VecDeque<Duration>>,
    uploads: AtomicUsize,
}

/// Blob store keeping uploaded bytes in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<MemoryBlobInner>,
}

const MEMORY_URL_PREFIX: &str = "memory://";

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th upload call (zero-based) fail.
    pub async fn fail_upload(&self, n: usize) {
        self.inner.failing_calls.write().await.push(n);
    }

    /// Queue per-call upload latencies, consumed in call order.
    pub async fn push_delays(&self, delays: impl IntoIterator<Item = Duration>) {
        self.inner.delays.lock().await.extend(delays);
    }

    pub fn upload_count(&self) -> usize {
        self.inner.uploads.load(AtomicOrdering::SeqCst)
    }

    pub async fn blob_count(&self) -> usize {
        self.inner.blobs.read().await.len()
    }

    /// Bytes behind a URL handed out by this store
    pub async fn bytes_at(&self, url: &str) -> Option<Vec<u8>> {
        let key = url.strip_prefix(MEMORY_URL_PREFIX)?;
        self.inner.blobs.read().await.get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, key: &str, image: &ImageFile) -> Result<BlobRef> {
        let call = self.inner.uploads.fetch_add(1, AtomicOrdering::SeqCst);
        let delay = self.inner.delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.inner.failing_calls.read().await.contains(&call) {
            bail!("simulated upload failure for {key}");
        }

        let mut blobs = self.inner.blobs.write().await;
        if blobs.contains_key(key) {
            bail!("blob key collision: {key}");
        }
        blobs.insert(key.to_string(), image.bytes.clone());
        Ok(BlobRef {
            key: key.to_string(),
        })
    }

    async fn public_url(&self, blob: &BlobRef) -> Result<String> {
        Ok(format!("{MEMORY_URL_PREFIX}{}", blob.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::types::{Cursor, Operator};
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone};
    use serde_json::json;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap() + ChronoDuration::minutes(minutes)
    }

    async fn seeded() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        for (id, minute, price) in [("a", 1, 5.0), ("b", 2, 10.0), ("c", 3, 30.0), ("d", 4, 60.0)] {
            store
                .seed(
                    "items",
                    id,
                    json!({ "price": price, "createdAt": at(minute).to_rfc3339() }),
                )
                .await;
        }
        store
    }

    #[tokio::test]
    async fn test_query_orders_descending_and_resumes_after_cursor() {
        let store = seeded().await;
        let query = ListingQuery::new()
            .order_by(fields::CREATED_AT, SortDirection::Descending)
            .limit(2);
        let first: Vec<String> = store
            .query("items", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(first, vec!["d", "c"]);

        let query = query.start_after(Some(Cursor::new(at(3), "c")));
        let second: Vec<String> = store
            .query("items", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(second, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_query_applies_range_predicates() {
        let store = seeded().await;
        let query = ListingQuery::new()
            .filter("price", Operator::Gte, 10.0)
            .filter("price", Operator::Lte, 50.0);
        let mut ids: Vec<String> = store
            .query("items", &query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_update_stamps_updated_at() {
        let store = seeded().await;
        let mut change = Map::new();
        change.insert("price".to_string(), json!(11.0));
        assert!(store.update("items", "b", change, None).await.unwrap());

        let doc = store.get("items", "b").await.unwrap().unwrap();
        assert_eq!(doc.data["price"], json!(11.0));
        assert!(doc.data.get(fields::UPDATED_AT).is_some());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_skips_write_when_precondition_fails() {
        let store = seeded().await;
        let before = store.get("items", "b").await.unwrap().unwrap();

        let mut change = Map::new();
        change.insert("price".to_string(), json!(99.0));
        let stale = Predicate::new("price", Operator::Eq, -1.0);
        assert!(!store.update("items", "b", change.clone(), Some(&stale)).await.unwrap());
        assert_eq!(store.get("items", "b").await.unwrap().unwrap(), before);

        let current = Predicate::new("price", Operator::Eq, before.data["price"].clone());
        assert!(store.update("items", "b", change, Some(&current)).await.unwrap());
        let doc = store.get("items", "b").await.unwrap().unwrap();
        assert_eq!(doc.data["price"], json!(99.0));
    }

    #[tokio::test]
    async fn test_fail_mode_reads() {
        let store = seeded().await;
        store.set_fail_mode(Some(MockStoreFailure::Reads)).await;
        assert!(store.get("items", "a").await.is_err());
        assert!(store.insert("items", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn test_blob_failure_by_call_index() {
        let blobs = MemoryBlobStore::new();
        blobs.fail_upload(1).await;
        assert!(blobs.upload("k0", &ImageFile::new(b"x".to_vec())).await.is_ok());
        assert!(blobs.upload("k1", &ImageFile::new(b"y".to_vec())).await.is_err());
        assert_eq!(blobs.upload_count(), 2);
        assert_eq!(blobs.blob_count().await, 1);
    }
}
