use crate::config::Config;
use crate::error::{ListingError, ListingResult};
use crate::listings::normalizer::ListingDocument;
use crate::listings::traits::{BlobStore, DocumentStore};
use crate::models::{ImageFile, Listing, ListingDraft};
use chrono::Utc;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_PRICE: f64 = 10_000.0;
pub const MAX_IMAGES: usize = 5;
const TITLE_CHARS: (usize, usize) = (3, 100);
const DESCRIPTION_CHARS: (usize, usize) = (10, 1000);
const MAX_TAG_CHARS: usize = 50;

/// Write side of the marketplace: uploads images, then persists the record
pub struct ListingCreator {
    store: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    collection: String,
    image_prefix: String,
}

impl ListingCreator {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>, config: &Config) -> Self {
        Self {
            store,
            blobs,
            collection: config.collection.clone(),
            image_prefix: config.image_prefix.clone(),
        }
    }

    /// Create a listing from a draft and its images.
    ///
    /// The record is written only after every image upload succeeded, so a
    /// stored listing never references a missing image. Uploads already
    /// finished when a later one fails are not removed.
    pub async fn create(
        &self,
        draft: ListingDraft,
        images: Vec<ImageFile>,
    ) -> ListingResult<Listing> {
        validate_draft(&draft, images.len())?;

        let urls = self.upload_images(&images).await?;

        let document = ListingDocument::from_draft(&draft, urls, Utc::now());
        let data = serde_json::to_value(&document)
            .map_err(|e| ListingError::invalid(format!("unserializable listing: {e}")))?;

        let id = self
            .store
            .insert(&self.collection, data)
            .await
            .map_err(ListingError::StoreUnavailable)?;

        info!(
            "Created listing {} for {} with {} images",
            id,
            draft.owner_id,
            document.images.len()
        );

        Ok(document.into_listing(id))
    }

    /// Upload all images concurrently; URLs come back in input order.
    async fn upload_images(&self, images: &[ImageFile]) -> ListingResult<Vec<String>> {
        let batch = Utc::now().timestamp_millis();
        let blobs = &self.blobs;

        let uploads = images.iter().enumerate().map(|(index, image)| {
            let key = format!(
                "{}/{}_{}_{}",
                self.image_prefix,
                batch,
                index,
                Uuid::new_v4().simple()
            );
            async move {
                let failed = |source: anyhow::Error| ListingError::UploadFailed {
                    index: index + 1,
                    source,
                };
                debug!("Uploading image {} ({} bytes) to {}", index + 1, image.bytes.len(), key);
                let blob = blobs.upload(&key, image).await.map_err(failed)?;
                blobs.public_url(&blob).await.map_err(failed)
            }
        });

        try_join_all(uploads).await
    }
}

/// Check a draft against the listing invariants before any network call.
pub fn validate_draft(draft: &ListingDraft, image_count: usize) -> ListingResult<()> {
    if image_count == 0 {
        return Err(ListingError::invalid("at least one image is required"));
    }
    if image_count > MAX_IMAGES {
        return Err(ListingError::invalid(format!(
            "at most {MAX_IMAGES} images are allowed, got {image_count}"
        )));
    }

    if draft.owner_id.trim().is_empty() {
        return Err(ListingError::invalid("owner id must not be empty"));
    }

    check_length("title", &draft.title, TITLE_CHARS)?;
    check_length("description", &draft.description, DESCRIPTION_CHARS)?;

    if !draft.price.is_finite() || draft.price <= 0.0 || draft.price > MAX_PRICE {
        return Err(ListingError::invalid(format!(
            "price must be greater than 0 and at most {MAX_PRICE}, got {}",
            draft.price
        )));
    }

    match (draft.is_rental, draft.rental_period) {
        (true, None) => return Err(ListingError::invalid("rental listings need a rental period")),
        (false, Some(_)) => {
            return Err(ListingError::invalid(
                "rental period given for a listing that is not a rental",
            ))
        }
        _ => {}
    }

    if let Some(tag) = draft
        .tags
        .iter()
        .find(|tag| tag.trim().is_empty() || tag.chars().count() > MAX_TAG_CHARS)
    {
        return Err(ListingError::invalid(format!("invalid tag {tag:?}")));
    }

    if !draft.location.is_valid() {
        return Err(ListingError::invalid(
            "location needs latitude in [-90, 90], longitude in [-180, 180] and an address",
        ));
    }

    Ok(())
}

fn check_length(field: &str, value: &str, (min, max): (usize, usize)) -> ListingResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(ListingError::invalid(format!(
            "{field} must be {min}-{max} characters, got {len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Condition, Location, RentalPeriod};

    fn draft() -> ListingDraft {
        ListingDraft {
            owner_id: "user-1".to_string(),
            title: "Desk lamp".to_string(),
            description: "Warm white LED, adjustable arm".to_string(),
            category: Category::Furniture,
            tags: vec!["lamp".to_string()],
            condition: Condition::Good,
            price: 15.0,
            is_rental: false,
            rental_period: None,
            location: Location {
                latitude: 44.97,
                longitude: -93.23,
                address: "Pioneer Hall".to_string(),
            },
            course_tags: vec![],
            department_tags: vec![],
        }
    }

    fn is_invalid(result: ListingResult<()>) -> bool {
        matches!(result, Err(ListingError::InvalidArgument(_)))
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(validate_draft(&draft(), 1).is_ok());
        assert!(validate_draft(&draft(), MAX_IMAGES).is_ok());
    }

    #[test]
    fn test_image_count_bounds() {
        assert!(is_invalid(validate_draft(&draft(), 0)));
        assert!(is_invalid(validate_draft(&draft(), MAX_IMAGES + 1)));
    }

    #[test]
    fn test_price_bounds() {
        for price in [0.0, -1.0, MAX_PRICE + 0.01, f64::NAN, f64::INFINITY] {
            let d = ListingDraft { price, ..draft() };
            assert!(is_invalid(validate_draft(&d, 1)), "price {price} accepted");
        }
        let d = ListingDraft {
            price: MAX_PRICE,
            ..draft()
        };
        assert!(validate_draft(&d, 1).is_ok());
    }

    #[test]
    fn test_rental_consistency() {
        let missing_period = ListingDraft {
            is_rental: true,
            ..draft()
        };
        assert!(is_invalid(validate_draft(&missing_period, 1)));

        let stray_period = ListingDraft {
            rental_period: Some(RentalPeriod::Weekly),
            ..draft()
        };
        assert!(is_invalid(validate_draft(&stray_period, 1)));

        let rental = ListingDraft {
            is_rental: true,
            rental_period: Some(RentalPeriod::Semester),
            ..draft()
        };
        assert!(validate_draft(&rental, 1).is_ok());
    }

    #[test]
    fn test_text_lengths() {
        let short_title = ListingDraft {
            title: "  ab ".to_string(),
            ..draft()
        };
        assert!(is_invalid(validate_draft(&short_title, 1)));

        let short_description = ListingDraft {
            description: "too short".to_string(),
            ..draft()
        };
        assert!(is_invalid(validate_draft(&short_description, 1)));
    }

    #[test]
    fn test_tags_and_location() {
        let blank_tag = ListingDraft {
            tags: vec!["ok".to_string(), "  ".to_string()],
            ..draft()
        };
        assert!(is_invalid(validate_draft(&blank_tag, 1)));

        let mut off_map = draft();
        off_map.location.longitude = 200.0;
        assert!(is_invalid(validate_draft(&off_map, 1)));
    }
}
