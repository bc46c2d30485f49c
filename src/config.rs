use anyhow::{bail, Context, Result};
use dotenvy::dotenv;
use std::env;

/// Collection that holds listing documents
pub const DEFAULT_COLLECTION: &str = "products";

/// Blob key prefix for uploaded listing images
pub const DEFAULT_IMAGE_PREFIX: &str = "products";

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound on any requested page
pub const MAX_PAGE_SIZE: usize = 100;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub collection: String,
    pub image_prefix: String,
    pub page_size: usize,
    pub blob_endpoint: Option<String>,
    pub blob_public_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            image_prefix: DEFAULT_IMAGE_PREFIX.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            blob_endpoint: None,
            blob_public_url: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let page_size: usize = env::var("MARKET_PAGE_SIZE")
            .unwrap_or_else(|_| DEFAULT_PAGE_SIZE.to_string())
            .parse()
            .context("MARKET_PAGE_SIZE must be a valid number")?;

        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            bail!("MARKET_PAGE_SIZE must be between 1 and {MAX_PAGE_SIZE}, got {page_size}");
        }

        Ok(Self {
            collection: env::var("MARKET_COLLECTION")
                .unwrap_or_else(|_| DEFAULT_COLLECTION.to_string()),
            image_prefix: env::var("MARKET_IMAGE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_IMAGE_PREFIX.to_string()),
            page_size,
            blob_endpoint: env::var("MARKET_BLOB_ENDPOINT").ok(),
            blob_public_url: env::var("MARKET_BLOB_PUBLIC_URL").ok(),
        })
    }
}
