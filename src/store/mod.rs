//! Vector index service access.
//!
//! `IndexClient` is the boundary to the external service. `HttpIndexClient`
//! speaks its REST API; `MemoryIndexClient` is an in-process stand-in.
//! `StoreHandle` is the process-wide connection created at startup.

pub mod handle;
pub mod http;
pub mod memory;
pub mod traits;

pub use handle::StoreHandle;
pub use http::HttpIndexClient;
pub use memory::MemoryIndexClient;
pub use traits::{IndexClient, SearchParams, StoreResult};

/// Status codes reported by the index service. Zero is success.
pub mod status_code {
    pub const SUCCESS: i64 = 0;
    pub const UNEXPECTED_ERROR: i64 = 1;
    pub const CONNECT_FAILED: i64 = 2;
    pub const COLLECTION_NOT_EXISTS: i64 = 4;
    pub const ILLEGAL_ARGUMENT: i64 = 5;
    pub const ILLEGAL_DIMENSION: i64 = 7;
    pub const ILLEGAL_INDEX_TYPE: i64 = 8;
    pub const ILLEGAL_COLLECTION_NAME: i64 = 9;
    pub const ILLEGAL_TOPK: i64 = 10;
}
