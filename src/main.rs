use anyhow::Result;
use campus_exchange::listings::{
    BlobStore, ListingCreator, ListingQueryService, ListingStatusService, SearchFilters,
};
use campus_exchange::models::{
    Category, Condition, ImageFile, ListingDraft, ListingStatus, Location, RentalPeriod,
};
use campus_exchange::stores::{HttpBlobStore, MemoryBlobStore, MemoryDocumentStore};
use campus_exchange::Config;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Campus Exchange - listing service demo");

    let config = Config::from_env()?;

    let store = Arc::new(MemoryDocumentStore::new());
    let blobs: Arc<dyn BlobStore> = match &config.blob_endpoint {
        Some(endpoint) => {
            let public = config.blob_public_url.clone().unwrap_or_else(|| endpoint.clone());
            info!("Uploading images to {}", endpoint);
            Arc::new(HttpBlobStore::with_public_base(endpoint.clone(), public)?)
        }
        None => Arc::new(MemoryBlobStore::new()),
    };

    let creator = ListingCreator::new(store.clone(), blobs, &config);
    let queries = ListingQueryService::new(store.clone(), &config);
    let statuses = ListingStatusService::new(store.clone(), &config);

    let mut created = Vec::new();
    for (draft, image_count) in sample_drafts() {
        let images = (0..image_count)
            .map(|i| {
                ImageFile::new(format!("{}-{}", draft.title, i).into_bytes())
                    .with_content_type("image/jpeg")
            })
            .collect();
        created.push(creator.create(draft, images).await?);
    }

    // The lamp sells right away
    if let Some(lamp) = created.iter().find(|l| l.title == "Desk lamp") {
        statuses
            .update_status(&lamp.id, &lamp.owner_id, ListingStatus::Sold)
            .await?;
    }

    let filters = SearchFilters {
        max_price: Some(100.0),
        ..Default::default()
    };
    let page = queries.query(&filters, None, None).await?;

    info!("Found {} available listings under 100", page.listings.len());

    for (i, listing) in page.listings.iter().enumerate() {
        println!("{}. {} ({:.2})", i + 1, listing.title, listing.price);
        println!("   {} / {}", listing.category.as_str(), listing.condition.as_str());
        if let Some(period) = listing.rental_period {
            println!("   Rental: {:?}", period);
        }
        if let Some(location) = &listing.location {
            println!("   Pickup: {}", location.address);
        }
        println!("   Tags: {}", listing.tags.join(", "));
        println!("   ID: {}", listing.id);
        println!();
    }

    let json = serde_json::to_string_pretty(&page)?;
    tokio::fs::write("listings.json", json).await?;
    info!("Saved query page to listings.json");

    Ok(())
}

fn sample_drafts() -> Vec<(ListingDraft, usize)> {
    let location = |address: &str| Location {
        latitude: 44.9740,
        longitude: -93.2277,
        address: address.to_string(),
    };

    vec![
        (
            ListingDraft {
                owner_id: "student_1".to_string(),
                title: "Calculus: Early Transcendentals".to_string(),
                description: "8th edition, a few highlighted pages.".to_string(),
                category: Category::Textbooks,
                tags: vec!["math".to_string(), "MATH 1271".to_string()],
                condition: Condition::Good,
                price: 45.0,
                is_rental: false,
                rental_period: None,
                location: location("Walter Library"),
                course_tags: vec!["MATH 1271".to_string()],
                department_tags: vec!["Mathematics".to_string()],
            },
            2,
        ),
        (
            ListingDraft {
                owner_id: "student_2".to_string(),
                title: "Desk lamp".to_string(),
                description: "Warm white LED with adjustable arm.".to_string(),
                category: Category::Furniture,
                tags: vec!["lamp".to_string()],
                condition: Condition::LikeNew,
                price: 15.0,
                is_rental: false,
                rental_period: None,
                location: location("Pioneer Hall"),
                course_tags: vec![],
                department_tags: vec![],
            },
            1,
        ),
        (
            ListingDraft {
                owner_id: "student_3".to_string(),
                title: "Graphing calculator".to_string(),
                description: "TI-84 Plus, rent it for the semester.".to_string(),
                category: Category::Electronics,
                tags: vec!["calculator".to_string(), "TI-84".to_string()],
                condition: Condition::Fair,
                price: 20.0,
                is_rental: true,
                rental_period: Some(RentalPeriod::Semester),
                location: location("Coffman Union"),
                course_tags: vec![],
                department_tags: vec![],
            },
            3,
        ),
    ]
}
