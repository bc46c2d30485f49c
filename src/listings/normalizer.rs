//! Validated decoding of raw listing documents.
//!
//! Nothing past this module sees the store's untyped JSON.

use crate::error::{ListingError, ListingResult};
use crate::listings::traits::StoredDocument;
use crate::listings::types::{fields, Cursor};
use crate::models::{
    Category, Condition, Listing, ListingDraft, ListingStatus, Location, RentalPeriod,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Stored shape of a listing document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingDocument {
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    pub condition: Condition,
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_rental: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rental_duration: Option<RentalPeriod>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<String>,
    pub status: ListingStatus,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub course_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub department_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ListingDocument {
    /// Document for a freshly created listing
    pub fn from_draft(draft: &ListingDraft, images: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            seller_id: draft.owner_id.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            category: draft.category,
            tags: draft.tags.iter().map(|tag| tag.trim().to_string()).collect(),
            condition: draft.condition,
            price: draft.price,
            is_rental: draft.is_rental,
            rental_duration: draft.rental_period,
            images,
            status: ListingStatus::Available,
            location: Some(draft.location.clone()),
            course_tags: draft.course_tags.clone(),
            department_tags: draft.department_tags.clone(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    pub fn into_listing(self, id: impl Into<String>) -> Listing {
        let location = self.location.filter(Location::is_valid);
        let updated_at = self.updated_at.unwrap_or(self.created_at);
        // A period without the rental flag carries no meaning
        let rental_period = if self.is_rental {
            self.rental_duration
        } else {
            None
        };

        Listing {
            id: id.into(),
            owner_id: self.seller_id,
            title: self.title,
            description: self.description,
            category: self.category,
            tags: self.tags,
            condition: self.condition,
            price: self.price,
            is_rental: self.is_rental,
            rental_period,
            images: self.images,
            status: self.status,
            location,
            course_tags: self.course_tags,
            department_tags: self.department_tags,
            created_at: self.created_at,
            updated_at,
        }
    }
}

/// Map a raw stored document into a [`Listing`].
///
/// Fails with `MalformedRecord` when a required field is absent or has the
/// wrong shape. Optional collections default to empty.
pub fn normalize(document: &StoredDocument) -> ListingResult<Listing> {
    let parsed: ListingDocument = serde_json::from_value(document.data.clone())
        .map_err(|e| ListingError::malformed(&document.id, e.to_string()))?;

    if parsed.seller_id.trim().is_empty() {
        return Err(ListingError::malformed(&document.id, "empty sellerId"));
    }

    if !parsed.price.is_finite() || parsed.price <= 0.0 {
        return Err(ListingError::malformed(
            &document.id,
            format!("price must be positive, got {}", parsed.price),
        ));
    }

    if parsed.is_rental && parsed.rental_duration.is_none() {
        return Err(ListingError::malformed(
            &document.id,
            "rental listing without rentalDuration",
        ));
    }

    if let Some(location) = &parsed.location {
        if !location.is_valid() {
            debug!("Dropping invalid location on listing {}", document.id);
        }
    }

    Ok(parsed.into_listing(document.id.clone()))
}

/// Position of a raw document, readable even when the rest of it is not.
pub(crate) fn raw_position(document: &StoredDocument) -> Option<Cursor> {
    let created_at = document.data.get(fields::CREATED_AT)?.as_str()?;
    let created_at = DateTime::parse_from_rfc3339(created_at).ok()?;
    Some(Cursor::new(created_at.with_timezone(&Utc), document.id.clone()))
}
