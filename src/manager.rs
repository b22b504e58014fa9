//! Collection lifecycle and vector traffic against the index service.
//!
//! The manager never panics on store failures: every operation returns a
//! `Result`, and store errors are logged with their collection context before
//! being returned. Inserts and deletes finish with a flush, so a caller that
//! gets `Ok` can immediately count or query the change.

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, IndexConfig};
use crate::error::{Result, SemprintError, StoreError};
use crate::store::{status_code, IndexClient, SearchParams, StoreHandle, StoreResult};
use crate::types::{
    CollectionInfo, CollectionSchema, IndexKind, NodeIdListing, QueryResult, SentenceVector,
    VectorCount, VectorId, VectorRecord,
};

pub struct VectorStoreManager {
    store: std::result::Result<StoreHandle, String>,
    index: IndexConfig,
}

impl VectorStoreManager {
    pub fn new(store: StoreHandle, index: IndexConfig) -> Self {
        Self {
            store: Ok(store),
            index,
        }
    }

    /// A manager whose store could not be reached. Every operation fails with
    /// `StoreUnavailable`.
    pub fn unavailable(reason: impl Into<String>, index: IndexConfig) -> Self {
        Self {
            store: Err(reason.into()),
            index,
        }
    }

    /// Connect to the configured store. A connection failure is logged and
    /// yields an unavailable manager rather than an error.
    pub async fn connect(config: &Config) -> Self {
        match StoreHandle::connect(&config.store).await {
            Ok(handle) => Self::new(handle, config.index.clone()),
            Err(e) => Self::unavailable(e.to_string(), config.index.clone()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_ok()
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.index
    }

    fn client(&self) -> Result<&dyn IndexClient> {
        match &self.store {
            Ok(handle) => Ok(handle.client()),
            Err(reason) => Err(SemprintError::StoreUnavailable {
                reason: reason.clone(),
            }),
        }
    }

    /// Create `name` with `dimension` and build its index, unless it already
    /// exists. An existing collection with another dimension is an error.
    #[instrument(skip_all, fields(collection = name, dimension = dimension))]
    pub async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<()> {
        let start = Instant::now();
        let result = self.ensure_collection_inner(name, dimension).await;
        record("ensure_collection", start, &result);
        if let Err(e) = &result {
            error!(collection = name, dimension, error = %e, "failed to ensure collection");
        }
        result
    }

    async fn ensure_collection_inner(&self, name: &str, dimension: usize) -> Result<()> {
        let client = self.client()?;
        validate_name(name)?;
        if dimension == 0 {
            return Err(SemprintError::Validation("dimension must be > 0".into()));
        }

        if client.has_collection(name).await? {
            let info = describe(client, name).await?;
            if info.dimension != dimension {
                return Err(SemprintError::DimensionMismatch {
                    expected: info.dimension,
                    actual: dimension,
                });
            }
            // A creation interrupted before the index was built leaves no
            // index, or the store's default FLAT one. Any other index stays.
            let unbuilt = matches!(info.index, None | Some(IndexKind::Flat));
            if unbuilt && self.index.index_kind != IndexKind::Flat {
                client
                    .create_index(name, self.index.index_kind, self.index.cluster_count)
                    .await?;
                info!(collection = name, index = %self.index.index_kind, "rebuilt missing index");
            }
            debug!(collection = name, "collection already exists");
            return Ok(());
        }

        let schema = CollectionSchema {
            name: name.to_string(),
            dimension,
            index_file_size: self.index.index_file_size,
            metric: self.index.metric,
        };
        client.create_collection(&schema).await?;
        info!(collection = name, dimension, metric = %schema.metric, "created collection");

        client
            .create_index(name, self.index.index_kind, self.index.cluster_count)
            .await?;
        info!(
            collection = name,
            index = %self.index.index_kind,
            nlist = self.index.cluster_count,
            "created index"
        );
        Ok(())
    }

    /// Create partition `tag` under `name` unless it already exists.
    #[instrument(skip_all, fields(collection = name, partition = tag))]
    pub async fn ensure_partition(&self, name: &str, tag: &str) -> Result<()> {
        let start = Instant::now();
        let result: Result<()> = async {
            let client = self.client()?;
            validate_name(name)?;
            validate_tag(tag)?;
            let partitions = client
                .list_partitions(name)
                .await
                .map_err(|e| store_error(e, name))?;
            if partitions.iter().any(|p| p == tag) {
                return Ok(());
            }
            client
                .create_partition(name, tag)
                .await
                .map_err(|e| store_error(e, name))?;
            info!(collection = name, partition = tag, "created partition");
            Ok(())
        }
        .await;
        record("ensure_partition", start, &result);
        if let Err(e) = &result {
            error!(collection = name, partition = tag, error = %e, "failed to ensure partition");
        }
        result
    }

    /// Insert `records` and flush.
    ///
    /// Widths are checked against the collection before anything is written,
    /// so a mismatched batch is rejected whole.
    #[instrument(skip_all, fields(collection = name, partition = ?partition, records = records.len()))]
    pub async fn insert(
        &self,
        name: &str,
        partition: Option<&str>,
        records: &[VectorRecord],
    ) -> Result<()> {
        let start = Instant::now();
        let result = self.insert_inner(name, partition, records).await;
        record("insert", start, &result);
        if let Err(e) = &result {
            let ids: Vec<VectorId> = records.iter().map(|r| r.id).collect();
            error!(collection = name, partition = ?partition, ?ids, error = %e, "failed to insert vectors");
        }
        result
    }

    async fn insert_inner(
        &self,
        name: &str,
        partition: Option<&str>,
        records: &[VectorRecord],
    ) -> Result<()> {
        let client = self.client()?;
        validate_name(name)?;
        validate_partition(partition)?;
        if records.is_empty() {
            debug!(collection = name, "nothing to insert");
            return Ok(());
        }

        let info = describe(client, name).await?;
        check_dimensions(info.dimension, records.iter().map(|r| &r.vector))?;

        let ids: Vec<VectorId> = records.iter().map(|r| r.id).collect();
        let vectors: Vec<&[f32]> = records.iter().map(|r| r.vector.as_slice()).collect();
        let inserted = client
            .insert(name, partition, &ids, &vectors)
            .await
            .map_err(|e| store_error(e, name))?;
        if inserted.len() != ids.len() {
            return Err(SemprintError::Store(StoreError::Decode(format!(
                "store acknowledged {} of {} vectors",
                inserted.len(),
                ids.len()
            ))));
        }
        info!(collection = name, partition = ?partition, ?ids, "inserted vectors");

        client.flush(&[name]).await.map_err(|e| store_error(e, name))?;
        debug!(collection = name, "flushed collection");
        Ok(())
    }

    /// Delete `ids`, compact, and flush. An empty id list is a no-op.
    #[instrument(skip_all, fields(collection = name, ids = ids.len()))]
    pub async fn delete(&self, name: &str, ids: &[VectorId]) -> Result<()> {
        let start = Instant::now();
        let result: Result<()> = async {
            let client = self.client()?;
            validate_name(name)?;
            if ids.is_empty() {
                return Ok(());
            }
            client
                .delete_by_id(name, ids)
                .await
                .map_err(|e| store_error(e, name))?;
            info!(collection = name, ?ids, "deleted vectors");

            client.compact(name).await.map_err(|e| store_error(e, name))?;
            client.flush(&[name]).await.map_err(|e| store_error(e, name))?;
            debug!(collection = name, "compacted and flushed collection");
            Ok(())
        }
        .await;
        record("delete", start, &result);
        if let Err(e) = &result {
            error!(collection = name, ?ids, error = %e, "failed to delete vectors");
        }
        result
    }

    /// Nearest neighbors of each query vector, ranked by the collection metric.
    #[instrument(skip_all, fields(collection = name, partition = ?partition, queries = queries.len(), top_k = top_k))]
    pub async fn query(
        &self,
        name: &str,
        partition: Option<&str>,
        queries: &[SentenceVector],
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let start = Instant::now();
        let result = self.query_inner(name, partition, queries, top_k).await;
        record("query", start, &result);
        if let Err(e) = &result {
            error!(collection = name, partition = ?partition, top_k, error = %e, "failed to query collection");
        }
        result
    }

    async fn query_inner(
        &self,
        name: &str,
        partition: Option<&str>,
        queries: &[SentenceVector],
        top_k: usize,
    ) -> Result<Vec<QueryResult>> {
        let client = self.client()?;
        validate_name(name)?;
        validate_partition(partition)?;
        if top_k == 0 {
            return Err(SemprintError::Validation("top_k must be > 0".into()));
        }
        if top_k > self.index.max_top_k {
            return Err(SemprintError::Validation(format!(
                "top_k {top_k} exceeds maximum of {}",
                self.index.max_top_k
            )));
        }
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let info = describe(client, name).await?;
        check_dimensions(info.dimension, queries.iter())?;

        let partitions: Vec<&str> = partition.into_iter().collect();
        let vectors: Vec<&[f32]> = queries.iter().map(|q| q.as_slice()).collect();
        let params = SearchParams {
            top_k,
            nprobe: self.index.search_breadth,
        };
        let results = client
            .search(name, &partitions, &vectors, &params)
            .await
            .map_err(|e| store_error(e, name))?;

        info!(
            collection = name,
            partition = ?partition,
            hits = results.iter().map(Vec::len).sum::<usize>(),
            "queried collection"
        );
        Ok(results)
    }

    #[instrument(skip_all, fields(collection = name))]
    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        let start = Instant::now();
        let result: Result<bool> = async {
            let client = self.client()?;
            validate_name(name)?;
            Ok(client.has_collection(name).await?)
        }
        .await;
        record("has_collection", start, &result);
        if let Err(e) = &result {
            error!(collection = name, error = %e, "failed to check collection");
        }
        result
    }

    /// Drop `name`. Dropping an absent collection is a logged no-op.
    #[instrument(skip_all, fields(collection = name))]
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        let start = Instant::now();
        let result: Result<()> = async {
            let client = self.client()?;
            validate_name(name)?;
            if !client.has_collection(name).await? {
                info!(collection = name, "collection does not exist, nothing to delete");
                return Ok(());
            }
            client.drop_collection(name).await?;
            info!(collection = name, "deleted collection");
            Ok(())
        }
        .await;
        record("delete_collection", start, &result);
        if let Err(e) = &result {
            error!(collection = name, error = %e, "failed to delete collection");
        }
        result
    }

    /// Every id stored in `name`, across all partitions and segments.
    ///
    /// Segments whose ids cannot be read are skipped with a warning and listed
    /// in `unreadable_segments`.
    #[instrument(skip_all, fields(collection = name))]
    pub async fn list_node_ids(&self, name: &str) -> Result<NodeIdListing> {
        let start = Instant::now();
        let result: Result<NodeIdListing> = async {
            let client = self.client()?;
            validate_name(name)?;
            let stats = client
                .collection_stats(name)
                .await
                .map_err(|e| store_error(e, name))?;

            let mut listing = NodeIdListing::default();
            for partition in &stats.partitions {
                let Some(segments) = &partition.segments else {
                    continue;
                };
                for segment in segments {
                    match client.list_ids_in_segment(name, &segment.name).await {
                        Ok(ids) => listing.ids.extend(ids),
                        Err(e) => {
                            warn!(
                                collection = name,
                                partition = %partition.tag,
                                segment = %segment.name,
                                error = %e,
                                "failed to list ids in segment"
                            );
                            listing.unreadable_segments.push(segment.name.clone());
                        }
                    }
                }
            }
            debug!(collection = name, ids = listing.ids.len(), "listed node ids");
            Ok(listing)
        }
        .await;
        record("list_node_ids", start, &result);
        if let Err(e) = &result {
            warn!(collection = name, error = %e, "failed to list node ids");
        }
        result
    }

    /// Total vectors across `names`, or across every collection when `names`
    /// is empty. A collection whose count fails is logged and left out.
    #[instrument(skip_all, fields(collections = names.len()))]
    pub async fn count_vectors(&self, names: &[&str]) -> Result<VectorCount> {
        let start = Instant::now();
        let result: Result<VectorCount> = async {
            let client = self.client()?;
            for name in names {
                validate_name(name)?;
            }
            let names: Vec<String> = if names.is_empty() {
                client.list_collections().await?
            } else {
                names.iter().map(|n| n.to_string()).collect()
            };

            let mut count = VectorCount::default();
            for name in &names {
                let outcome: StoreResult<Option<u64>> = async {
                    if !client.has_collection(name).await? {
                        return Ok(None);
                    }
                    client.count_entities(name).await.map(Some)
                }
                .await;
                match outcome {
                    Ok(Some(n)) => count.total_count += n,
                    Ok(None) => debug!(collection = %name, "collection absent, not counted"),
                    Err(e) => {
                        error!(collection = %name, error = %e, "failed to count vectors");
                        count.skipped.push(name.clone());
                    }
                }
            }
            Ok(count)
        }
        .await;
        record("count_vectors", start, &result);
        if let Err(e) = &result {
            error!(error = %e, "failed to count vectors");
        }
        result
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let start = Instant::now();
        let result: Result<Vec<String>> = async { Ok(self.client()?.list_collections().await?) }.await;
        record("list_collections", start, &result);
        result
    }

    pub async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let start = Instant::now();
        let result: Result<CollectionInfo> = async {
            let client = self.client()?;
            validate_name(name)?;
            describe(client, name).await
        }
        .await;
        record("collection_info", start, &result);
        result
    }
}

async fn describe(client: &dyn IndexClient, name: &str) -> Result<CollectionInfo> {
    client
        .describe_collection(name)
        .await
        .map_err(|e| store_error(e, name))
}

/// Map "collection does not exist" to its own variant; everything else stays a
/// store error.
fn store_error(e: StoreError, collection: &str) -> SemprintError {
    match e {
        StoreError::Status { code, .. } if code == status_code::COLLECTION_NOT_EXISTS => {
            SemprintError::CollectionNotFound {
                collection: collection.to_string(),
            }
        }
        other => SemprintError::Store(other),
    }
}

const MAX_NAME_LENGTH: usize = 255;

/// Collection names and partition tags follow the store's naming rule:
/// `[A-Za-z_][A-Za-z0-9_]*`, at most 255 characters.
fn validate_identifier(what: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_start || !valid_rest || value.len() > MAX_NAME_LENGTH {
        return Err(SemprintError::Validation(format!(
            "invalid {what} {value:?}: expected [A-Za-z_][A-Za-z0-9_]* of at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    validate_identifier("collection name", name)
}

fn validate_tag(tag: &str) -> Result<()> {
    validate_identifier("partition tag", tag)
}

fn validate_partition(partition: Option<&str>) -> Result<()> {
    partition.map_or(Ok(()), validate_tag)
}

fn check_dimensions<'a>(
    expected: usize,
    vectors: impl Iterator<Item = &'a SentenceVector>,
) -> Result<()> {
    for v in vectors {
        if v.dimension() != expected {
            return Err(SemprintError::DimensionMismatch {
                expected,
                actual: v.dimension(),
            });
        }
    }
    Ok(())
}

fn record<T>(operation: &str, start: Instant, result: &Result<T>) {
    let status = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    crate::metrics::STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    crate::metrics::STORE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());
}
