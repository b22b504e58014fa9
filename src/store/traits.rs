//! Contract the manager needs from an external vector index service.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{
    CollectionInfo, CollectionSchema, CollectionStats, IndexKind, QueryResult, VectorId,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Search parameters passed through to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub top_k: usize,
    /// Clusters scanned per query.
    pub nprobe: usize,
}

/// Low-level operations of a vector index service.
///
/// Every method maps to one service call. A non-zero status code from the
/// service comes back as `StoreError::Status`.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Liveness check used at startup.
    async fn server_status(&self) -> StoreResult<()>;

    async fn has_collection(&self, name: &str) -> StoreResult<bool>;

    async fn create_collection(&self, schema: &CollectionSchema) -> StoreResult<()>;

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionInfo>;

    async fn drop_collection(&self, name: &str) -> StoreResult<()>;

    async fn list_collections(&self) -> StoreResult<Vec<String>>;

    async fn create_index(&self, name: &str, kind: IndexKind, nlist: usize) -> StoreResult<()>;

    async fn create_partition(&self, name: &str, tag: &str) -> StoreResult<()>;

    async fn list_partitions(&self, name: &str) -> StoreResult<Vec<String>>;

    async fn insert(
        &self,
        name: &str,
        partition: Option<&str>,
        ids: &[VectorId],
        vectors: &[&[f32]],
    ) -> StoreResult<Vec<VectorId>>;

    async fn delete_by_id(&self, name: &str, ids: &[VectorId]) -> StoreResult<()>;

    async fn flush(&self, names: &[&str]) -> StoreResult<()>;

    async fn compact(&self, name: &str) -> StoreResult<()>;

    async fn search(
        &self,
        name: &str,
        partitions: &[&str],
        queries: &[&[f32]],
        params: &SearchParams,
    ) -> StoreResult<Vec<QueryResult>>;

    async fn collection_stats(&self, name: &str) -> StoreResult<CollectionStats>;

    async fn list_ids_in_segment(&self, name: &str, segment: &str) -> StoreResult<Vec<VectorId>>;

    async fn count_entities(&self, name: &str) -> StoreResult<u64>;
}
