//! semprint: sentence fingerprints and vector index lifecycle management.

pub mod config;
pub mod embedding;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod store;
pub mod types;

pub use embedding::Embedder;
pub use manager::VectorStoreManager;
