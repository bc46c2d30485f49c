pub mod config;
pub mod error;
pub mod listings;
pub mod models;
pub mod stores;

pub use config::Config;
pub use error::{ListingError, ListingResult};
