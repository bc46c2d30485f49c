use crate::config::{Config, MAX_PAGE_SIZE};
use crate::error::{ListingError, ListingResult};
use crate::listings::normalizer::{normalize, raw_position};
use crate::listings::traits::DocumentStore;
use crate::listings::types::{
    fields, Cursor, ListingQuery, Operator, QueryPage, SearchFilters, SortDirection,
};
use crate::models::{Listing, ListingStatus};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build the store query for a page of available listings.
///
/// The status restriction and ordering are always present. Each filter
/// field that is set and non-default appends exactly one predicate.
pub fn build_query(filters: &SearchFilters, cursor: Option<Cursor>, limit: usize) -> ListingQuery {
    let mut query = ListingQuery::new()
        .filter(
            fields::STATUS,
            Operator::Eq,
            ListingStatus::Available.as_str(),
        )
        .order_by(fields::CREATED_AT, SortDirection::Descending)
        .limit(limit);

    if let Some(category) = filters.category {
        query = query.filter(fields::CATEGORY, Operator::Eq, category.as_str());
    }

    if let Some(min) = filters.min_price.filter(|p| *p > 0.0) {
        query = query.filter(fields::PRICE, Operator::Gte, min);
    }

    if let Some(max) = filters.max_price.filter(|p| *p > 0.0) {
        query = query.filter(fields::PRICE, Operator::Lte, max);
    }

    if let Some(is_rental) = filters.is_rental {
        query = query.filter(fields::IS_RENTAL, Operator::Eq, is_rental);
    }

    if !filters.conditions.is_empty() {
        let accepted: Vec<Value> = filters
            .conditions
            .iter()
            .map(|c| Value::from(c.as_str()))
            .collect();
        query = query.filter(fields::CONDITION, Operator::In, accepted);
    }

    query.start_after(cursor)
}

/// Read side of the marketplace: search, single fetch, per-owner listing
pub struct ListingQueryService {
    store: Arc<dyn DocumentStore>,
    collection: String,
    default_page_size: usize,
}

impl ListingQueryService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            store,
            collection: config.collection.clone(),
            default_page_size: config.page_size,
        }
    }

    /// Fetch one page of available listings matching `filters`, newest first.
    ///
    /// `page_size` defaults to the configured size and must be in 1..=100.
    /// Records that fail normalization are logged and skipped. A failing
    /// store is reported as `StoreUnavailable`, never as an empty page.
    pub async fn query(
        &self,
        filters: &SearchFilters,
        cursor: Option<&str>,
        page_size: Option<usize>,
    ) -> ListingResult<QueryPage> {
        let page_size = page_size.unwrap_or(self.default_page_size);
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ListingError::invalid(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
            )));
        }

        validate_filters(filters)?;

        let cursor = cursor
            .map(Cursor::decode)
            .transpose()
            .map_err(|e| ListingError::invalid(e.to_string()))?;

        // One extra document tells us whether another page exists
        let query = build_query(filters, cursor, page_size + 1);
        debug!(
            "Querying {} on {} with {} predicates",
            self.collection,
            self.store.store_name(),
            query.predicates.len()
        );

        let mut documents = self
            .store
            .query(&self.collection, &query)
            .await
            .map_err(|e| {
                warn!("Listing query failed: {:#}", e);
                ListingError::StoreUnavailable(e)
            })?;

        let has_more = documents.len() > page_size;
        documents.truncate(page_size);

        let mut listings = Vec::with_capacity(documents.len());
        let mut last_position: Option<Cursor> = None;

        for document in &documents {
            match normalize(document) {
                Ok(listing) => {
                    last_position = Some(Cursor::of(&listing));
                    if filters.matches_locally(&listing) {
                        listings.push(listing);
                    }
                }
                Err(e) => warn!("Skipping listing: {}", e),
            }
        }

        let next_cursor = if has_more {
            // A window with nothing readable still has to advance
            last_position
                .or_else(|| documents.last().and_then(raw_position))
                .map(|position| position.encode())
                .transpose()?
        } else {
            None
        };

        info!(
            "Query returned {} listings ({} scanned, more: {})",
            listings.len(),
            documents.len(),
            next_cursor.is_some()
        );

        Ok(QueryPage {
            listings,
            next_cursor,
        })
    }

    /// Fetch a single listing regardless of status
    pub async fn get_by_id(&self, id: &str) -> ListingResult<Option<Listing>> {
        if id.trim().is_empty() {
            return Err(ListingError::invalid("listing id must not be empty"));
        }

        let document = self
            .store
            .get(&self.collection, id)
            .await
            .map_err(ListingError::StoreUnavailable)?;

        document.as_ref().map(normalize).transpose()
    }

    /// All listings of one owner in any status, newest first
    pub async fn list_by_owner(&self, owner_id: &str) -> ListingResult<Vec<Listing>> {
        if owner_id.trim().is_empty() {
            return Err(ListingError::invalid("owner id must not be empty"));
        }

        let query = ListingQuery::new()
            .filter(fields::OWNER_ID, Operator::Eq, owner_id)
            .order_by(fields::CREATED_AT, SortDirection::Descending);

        let documents = self
            .store
            .query(&self.collection, &query)
            .await
            .map_err(ListingError::StoreUnavailable)?;

        let listings = documents
            .iter()
            .filter_map(|document| match normalize(document) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!("Skipping owner listing: {}", e);
                    None
                }
            })
            .collect();

        Ok(listings)
    }
}

fn validate_filters(filters: &SearchFilters) -> ListingResult<()> {
    for (name, bound) in [("minimum", filters.min_price), ("maximum", filters.max_price)] {
        if let Some(price) = bound.filter(|p| !p.is_finite()) {
            return Err(ListingError::invalid(format!(
                "{name} price must be finite, got {price}"
            )));
        }
    }

    if let Some(distance) = &filters.max_distance {
        if !distance.origin.is_valid() {
            return Err(ListingError::invalid("distance origin is out of range"));
        }
        if !distance.max_km.is_finite() || distance.max_km <= 0.0 {
            return Err(ListingError::invalid(format!(
                "maximum distance must be positive, got {}",
                distance.max_km
            )));
        }
    }

    Ok(())
}
