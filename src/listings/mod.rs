pub mod create;
pub mod normalizer;
pub mod query;
pub mod status;
pub mod traits;
pub mod types;

pub use create::ListingCreator;
pub use normalizer::normalize;
pub use query::ListingQueryService;
pub use status::ListingStatusService;
pub use traits::{BlobRef, BlobStore, DocumentStore, StoredDocument};
pub use types::{Cursor, DistanceFilter, QueryPage, SearchFilters};
