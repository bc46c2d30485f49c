use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for distance filtering
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Category of a listed item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Textbooks,
    Electronics,
    Furniture,
    Clothing,
    Sports,
    Stationery,
    Appliances,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Textbooks => "textbooks",
            Category::Electronics => "electronics",
            Category::Furniture => "furniture",
            Category::Clothing => "clothing",
            Category::Sports => "sports",
            Category::Stationery => "stationery",
            Category::Appliances => "appliances",
            Category::Other => "other",
        }
    }
}

/// Physical condition of a listed item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    New,
    LikeNew,
    Good,
    Fair,
    Poor,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::LikeNew => "like-new",
            Condition::Good => "good",
            Condition::Fair => "fair",
            Condition::Poor => "poor",
        }
    }
}

/// Billing period of a rental listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RentalPeriod {
    Daily,
    Weekly,
    Monthly,
    Semester,
}

/// Lifecycle status of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Available,
    Sold,
    Rented,
    Reserved,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Sold => "sold",
            ListingStatus::Rented => "rented",
            ListingStatus::Reserved => "reserved",
        }
    }

    /// Only available listings move, and only forward.
    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (
                ListingStatus::Available,
                ListingStatus::Sold | ListingStatus::Rented | ListingStatus::Reserved
            )
        )
    }
}

/// A point on the globe
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in kilometers (haversine)
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Location information for a listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

impl Location {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_valid(&self) -> bool {
        self.point().is_valid() && !self.address.trim().is_empty()
    }
}

/// Core listing data model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub condition: Condition,
    pub price: f64,
    pub is_rental: bool,
    pub rental_period: Option<RentalPeriod>,
    pub images: Vec<String>,
    pub status: ListingStatus,
    pub location: Option<Location>,
    pub course_tags: Vec<String>,
    pub department_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Case-insensitive match against title, description and tags
    pub fn matches_text(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.title.to_lowercase().contains(&term)
            || self.description.to_lowercase().contains(&term)
            || self.tags.iter().any(|tag| tag.to_lowercase().contains(&term))
    }
}

/// Caller-supplied fields of a listing about to be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingDraft {
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    pub condition: Condition,
    pub price: f64,
    pub is_rental: bool,
    pub rental_period: Option<RentalPeriod>,
    pub location: Location,
    #[serde(default)]
    pub course_tags: Vec<String>,
    #[serde(default)]
    pub department_tags: Vec<String>,
}

/// Raw image bytes picked by the user, in display order
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl ImageFile {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}
