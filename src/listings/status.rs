use crate::config::Config;
use crate::error::{ListingError, ListingResult};
use crate::listings::normalizer::normalize;
use crate::listings::traits::DocumentStore;
use crate::listings::types::{fields, Operator, Predicate};
use crate::models::ListingStatus;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Owner-driven lifecycle changes on existing listings
pub struct ListingStatusService {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl ListingStatusService {
    pub fn new(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self {
            store,
            collection: config.collection.clone(),
        }
    }

    /// Move a listing out of `available`. Only its owner may do so.
    pub async fn update_status(
        &self,
        id: &str,
        actor_id: &str,
        status: ListingStatus,
    ) -> ListingResult<()> {
        if id.trim().is_empty() {
            return Err(ListingError::invalid("listing id must not be empty"));
        }
        if actor_id.trim().is_empty() {
            return Err(ListingError::invalid("actor id must not be empty"));
        }

        let document = self
            .store
            .get(&self.collection, id)
            .await
            .map_err(ListingError::StoreUnavailable)?
            .ok_or_else(|| ListingError::NotFound(id.to_string()))?;
        let listing = normalize(&document)?;

        if listing.owner_id != actor_id {
            return Err(ListingError::NotOwner {
                id: id.to_string(),
                actor: actor_id.to_string(),
            });
        }

        if !listing.status.can_transition_to(status) {
            return Err(ListingError::InvalidTransition {
                from: listing.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        let mut update = Map::new();
        update.insert(fields::STATUS.to_string(), Value::from(status.as_str()));
        let unchanged = Predicate::new(fields::STATUS, Operator::Eq, listing.status.as_str());

        let applied = self
            .store
            .update(&self.collection, id, update, Some(&unchanged))
            .await
            .map_err(ListingError::StoreUnavailable)?;

        if !applied {
            // Another writer moved the listing after we read it
            let current = self.current_status(id).await?;
            warn!(
                "Listing {} changed to {} before {} could be applied",
                id,
                current,
                status.as_str()
            );
            return Err(ListingError::InvalidTransition {
                from: current,
                to: status.as_str().to_string(),
            });
        }

        info!("Listing {} moved {} -> {}", id, listing.status.as_str(), status.as_str());
        Ok(())
    }

    async fn current_status(&self, id: &str) -> ListingResult<String> {
        let document = self
            .store
            .get(&self.collection, id)
            .await
            .map_err(ListingError::StoreUnavailable)?
            .ok_or_else(|| ListingError::NotFound(id.to_string()))?;
        Ok(normalize(&document)?.status.as_str().to_string())
    }
}
