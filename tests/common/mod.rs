#![allow(dead_code)]

use campus_exchange::listings::{ListingCreator, ListingQueryService, ListingStatusService};
use campus_exchange::models::{Category, Condition, ListingDraft, Location};
use campus_exchange::stores::{MemoryBlobStore, MemoryDocumentStore};
use campus_exchange::Config;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct Harness {
    pub config: Config,
    pub store: Arc<MemoryDocumentStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub queries: ListingQueryService,
    pub creator: ListingCreator,
    pub statuses: ListingStatusService,
}

impl Harness {
    pub fn new() -> Self {
        let config = Config::default();
        let store = Arc::new(MemoryDocumentStore::new());
        let blobs = Arc::new(MemoryBlobStore::new());
        Self {
            queries: ListingQueryService::new(store.clone(), &config),
            creator: ListingCreator::new(store.clone(), blobs.clone(), &config),
            statuses: ListingStatusService::new(store.clone(), &config),
            config,
            store,
            blobs,
        }
    }

    pub async fn seed(&self, id: &str, data: Value) {
        self.store.seed(&self.config.collection, id, data).await;
    }
}

pub fn minutes(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap() + Duration::minutes(n)
}

/// A well-formed stored listing document
pub fn listing_doc(price: f64, created_minute: i64) -> Value {
    json!({
        "sellerId": "seller-1",
        "title": format!("Item priced {price}"),
        "description": "A perfectly ordinary item",
        "category": "other",
        "tags": [],
        "condition": "good",
        "price": price,
        "isRental": false,
        "images": ["memory://products/seed"],
        "status": "available",
        "location": { "latitude": 44.97, "longitude": -93.23, "address": "Northrop" },
        "createdAt": minutes(created_minute).to_rfc3339(),
        "updatedAt": minutes(created_minute).to_rfc3339()
    })
}

pub fn draft() -> ListingDraft {
    ListingDraft {
        owner_id: "owner-1".to_string(),
        title: "Mini fridge".to_string(),
        description: "Fits under a dorm desk, runs quiet".to_string(),
        category: Category::Appliances,
        tags: vec!["fridge".to_string(), "dorm".to_string()],
        condition: Condition::Good,
        price: 60.0,
        is_rental: false,
        rental_period: None,
        location: Location {
            latitude: 44.9727,
            longitude: -93.2354,
            address: "Centennial Hall".to_string(),
        },
        course_tags: vec![],
        department_tags: vec![],
    }
}
