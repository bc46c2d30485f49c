pub mod http_blob;
pub mod memory;

pub use http_blob::HttpBlobStore;
pub use memory::{MemoryBlobStore, MemoryDocumentStore, MockStoreFailure};
