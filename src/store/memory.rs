//! In-process index service.
//!
//! Follows the status semantics of the HTTP service: writes are buffered until
//! `flush`, deletes are tombstones that `compact` reclaims, and errors carry a
//! status code. Search is exact.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::types::{
    CollectionInfo, CollectionSchema, CollectionStats, IndexKind, MetricType, PartitionStats,
    QueryResult, SearchHit, SegmentStats, VectorId,
};

use super::status_code;
use super::traits::{IndexClient, SearchParams, StoreResult};

pub const DEFAULT_PARTITION: &str = "_default";

struct Segment {
    name: String,
    partition: String,
    rows: Vec<(VectorId, Vec<f32>)>,
}

struct Collection {
    schema: CollectionSchema,
    index: Option<IndexKind>,
    partitions: Vec<String>,
    pending_inserts: Vec<(String, VectorId, Vec<f32>)>,
    pending_deletes: Vec<VectorId>,
    segments: Vec<Segment>,
    tombstones: HashSet<VectorId>,
}

impl Collection {
    fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            index: None,
            partitions: vec![DEFAULT_PARTITION.to_string()],
            pending_inserts: Vec::new(),
            pending_deletes: Vec::new(),
            segments: Vec::new(),
            tombstones: HashSet::new(),
        }
    }

    fn visible_rows(&self) -> impl Iterator<Item = (&Segment, &(VectorId, Vec<f32>))> {
        self.segments.iter().flat_map(move |s| {
            s.rows
                .iter()
                .filter(move |(id, _)| !self.tombstones.contains(id))
                .map(move |row| (s, row))
        })
    }

    fn row_count(&self) -> u64 {
        self.visible_rows().count() as u64
    }

    fn flush(&mut self, seq: u64) {
        for id in self.pending_deletes.drain(..) {
            self.tombstones.insert(id);
        }

        if self.pending_inserts.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending_inserts);
        let fresh: HashSet<VectorId> = pending.iter().map(|(_, id, _)| *id).collect();

        // Re-inserted ids replace their previous rows.
        for segment in &mut self.segments {
            segment.rows.retain(|(id, _)| !fresh.contains(id));
        }
        self.segments.retain(|s| !s.rows.is_empty());
        for id in &fresh {
            self.tombstones.remove(id);
        }

        for tag in self.partitions.clone() {
            let rows: Vec<(VectorId, Vec<f32>)> = pending
                .iter()
                .filter(|(p, _, _)| *p == tag)
                .map(|(_, id, v)| (*id, v.clone()))
                .collect();
            if rows.is_empty() {
                continue;
            }
            self.segments.push(Segment {
                name: format!("{seq}_{tag}"),
                partition: tag,
                rows,
            });
        }
    }

    fn compact(&mut self) {
        let tombstones = std::mem::take(&mut self.tombstones);
        for segment in &mut self.segments {
            segment.rows.retain(|(id, _)| !tombstones.contains(id));
        }
        self.segments.retain(|s| !s.rows.is_empty());
    }
}

/// In-memory `IndexClient`.
#[derive(Default)]
pub struct MemoryIndexClient {
    collections: DashMap<String, Collection>,
    segment_seq: AtomicU64,
    failures: DashMap<String, (i64, String)>,
}

impl MemoryIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future call of `operation` fail with the given status.
    ///
    /// `target` narrows the failure to one collection (or one segment for
    /// `list_ids_in_segment`).
    pub fn inject_failure(&self, operation: &str, target: Option<&str>, message: &str) {
        self.failures.insert(
            failure_key(operation, target),
            (status_code::UNEXPECTED_ERROR, message.to_string()),
        );
    }

    pub fn clear_failures(&self) {
        self.failures.clear();
    }

    /// Number of buffered, not yet flushed inserts for a collection.
    pub fn pending_inserts(&self, name: &str) -> usize {
        self.collections
            .get(name)
            .map_or(0, |c| c.pending_inserts.len())
    }

    fn check(&self, operation: &str, target: &str) -> StoreResult<()> {
        for key in [failure_key(operation, None), failure_key(operation, Some(target))] {
            if let Some(entry) = self.failures.get(&key) {
                let (code, message) = entry.value();
                return Err(StoreError::status(*code, message.clone()));
            }
        }
        Ok(())
    }

    fn missing(name: &str) -> StoreError {
        StoreError::status(
            status_code::COLLECTION_NOT_EXISTS,
            format!("collection {name} does not exist"),
        )
    }

    fn with_collection<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Collection) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut entry = self
            .collections
            .get_mut(name)
            .ok_or_else(|| Self::missing(name))?;
        f(entry.value_mut())
    }
}

fn failure_key(operation: &str, target: Option<&str>) -> String {
    match target {
        Some(t) => format!("{operation}:{t}"),
        None => operation.to_string(),
    }
}

fn score(metric: MetricType, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        MetricType::InnerProduct => a.iter().zip(b).map(|(x, y)| x * y).sum(),
        MetricType::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
    }
}

#[async_trait]
impl IndexClient for MemoryIndexClient {
    async fn server_status(&self) -> StoreResult<()> {
        self.check("server_status", "")
    }

    async fn has_collection(&self, name: &str) -> StoreResult<bool> {
        self.check("has_collection", name)?;
        Ok(self.collections.contains_key(name))
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> StoreResult<()> {
        self.check("create_collection", &schema.name)?;
        if schema.dimension == 0 || schema.dimension > 32768 {
            return Err(StoreError::status(
                status_code::ILLEGAL_DIMENSION,
                format!("invalid dimension {}", schema.dimension),
            ));
        }
        if self.collections.contains_key(&schema.name) {
            return Err(StoreError::status(
                status_code::ILLEGAL_COLLECTION_NAME,
                format!("collection {} already exists", schema.name),
            ));
        }
        self.collections
            .insert(schema.name.clone(), Collection::new(schema.clone()));
        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionInfo> {
        self.check("describe_collection", name)?;
        self.with_collection(name, |c| {
            Ok(CollectionInfo {
                name: c.schema.name.clone(),
                dimension: c.schema.dimension,
                index_file_size: c.schema.index_file_size,
                metric: c.schema.metric,
                index: c.index,
                row_count: c.row_count(),
            })
        })
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.check("drop_collection", name)?;
        self.collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::missing(name))
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.check("list_collections", "")?;
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, name: &str, kind: IndexKind, nlist: usize) -> StoreResult<()> {
        self.check("create_index", name)?;
        if nlist == 0 {
            return Err(StoreError::status(
                status_code::ILLEGAL_ARGUMENT,
                "nlist must be > 0",
            ));
        }
        self.with_collection(name, |c| {
            c.index = Some(kind);
            Ok(())
        })
    }

    async fn create_partition(&self, name: &str, tag: &str) -> StoreResult<()> {
        self.check("create_partition", name)?;
        self.with_collection(name, |c| {
            if c.partitions.iter().any(|p| p == tag) {
                return Err(StoreError::status(
                    status_code::ILLEGAL_ARGUMENT,
                    format!("partition {tag} already exists"),
                ));
            }
            c.partitions.push(tag.to_string());
            Ok(())
        })
    }

    async fn list_partitions(&self, name: &str) -> StoreResult<Vec<String>> {
        self.check("list_partitions", name)?;
        self.with_collection(name, |c| Ok(c.partitions.clone()))
    }

    async fn insert(
        &self,
        name: &str,
        partition: Option<&str>,
        ids: &[VectorId],
        vectors: &[&[f32]],
    ) -> StoreResult<Vec<VectorId>> {
        self.check("insert", name)?;
        if ids.len() != vectors.len() {
            return Err(StoreError::status(
                status_code::ILLEGAL_ARGUMENT,
                format!("{} ids for {} vectors", ids.len(), vectors.len()),
            ));
        }
        self.with_collection(name, |c| {
            let tag = partition.unwrap_or(DEFAULT_PARTITION);
            if !c.partitions.iter().any(|p| p == tag) {
                return Err(StoreError::status(
                    status_code::ILLEGAL_ARGUMENT,
                    format!("partition {tag} does not exist"),
                ));
            }
            if let Some(v) = vectors.iter().find(|v| v.len() != c.schema.dimension) {
                return Err(StoreError::status(
                    status_code::ILLEGAL_DIMENSION,
                    format!(
                        "vector dimension {} does not match collection dimension {}",
                        v.len(),
                        c.schema.dimension
                    ),
                ));
            }
            for (id, v) in ids.iter().zip(vectors) {
                c.pending_inserts.push((tag.to_string(), *id, v.to_vec()));
            }
            Ok(ids.to_vec())
        })
    }

    async fn delete_by_id(&self, name: &str, ids: &[VectorId]) -> StoreResult<()> {
        self.check("delete_by_id", name)?;
        self.with_collection(name, |c| {
            c.pending_inserts.retain(|(_, id, _)| !ids.contains(id));
            c.pending_deletes.extend_from_slice(ids);
            Ok(())
        })
    }

    async fn flush(&self, names: &[&str]) -> StoreResult<()> {
        for name in names {
            self.check("flush", name)?;
            let seq = self.segment_seq.fetch_add(1, Ordering::Relaxed);
            self.with_collection(name, |c| {
                c.flush(seq);
                Ok(())
            })?;
        }
        Ok(())
    }

    async fn compact(&self, name: &str) -> StoreResult<()> {
        self.check("compact", name)?;
        self.with_collection(name, |c| {
            c.compact();
            Ok(())
        })
    }

    async fn search(
        &self,
        name: &str,
        partitions: &[&str],
        queries: &[&[f32]],
        params: &SearchParams,
    ) -> StoreResult<Vec<QueryResult>> {
        self.check("search", name)?;
        if params.top_k == 0 {
            return Err(StoreError::status(status_code::ILLEGAL_TOPK, "top_k must be > 0"));
        }
        self.with_collection(name, |c| {
            if let Some(tag) = partitions
                .iter()
                .find(|t| !c.partitions.iter().any(|p| p == *t))
            {
                return Err(StoreError::status(
                    status_code::ILLEGAL_ARGUMENT,
                    format!("partition {tag} does not exist"),
                ));
            }
            if let Some(q) = queries.iter().find(|q| q.len() != c.schema.dimension) {
                return Err(StoreError::status(
                    status_code::ILLEGAL_DIMENSION,
                    format!(
                        "query dimension {} does not match collection dimension {}",
                        q.len(),
                        c.schema.dimension
                    ),
                ));
            }
            let metric = c.schema.metric;
            let results = queries
                .iter()
                .map(|q| {
                    let mut hits: Vec<SearchHit> = c
                        .visible_rows()
                        .filter(|(s, _)| {
                            partitions.is_empty() || partitions.contains(&s.partition.as_str())
                        })
                        .map(|(_, (id, v))| SearchHit {
                            id: *id,
                            distance: score(metric, q, v),
                        })
                        .collect();
                    hits.sort_by(|a, b| {
                        let ord = a
                            .distance
                            .partial_cmp(&b.distance)
                            .unwrap_or(std::cmp::Ordering::Equal);
                        if metric.higher_is_closer() {
                            ord.reverse()
                        } else {
                            ord
                        }
                    });
                    hits.truncate(params.top_k);
                    hits
                })
                .collect();
            Ok(results)
        })
    }

    async fn collection_stats(&self, name: &str) -> StoreResult<CollectionStats> {
        self.check("collection_stats", name)?;
        self.with_collection(name, |c| {
            let partitions = c
                .partitions
                .iter()
                .map(|tag| {
                    let segments: Vec<SegmentStats> = c
                        .segments
                        .iter()
                        .filter(|s| &s.partition == tag)
                        .map(|s| SegmentStats {
                            name: s.name.clone(),
                            row_count: s
                                .rows
                                .iter()
                                .filter(|(id, _)| !c.tombstones.contains(id))
                                .count() as u64,
                        })
                        .collect();
                    PartitionStats {
                        tag: tag.clone(),
                        row_count: segments.iter().map(|s| s.row_count).sum(),
                        segments: (!segments.is_empty()).then_some(segments),
                    }
                })
                .collect();
            Ok(CollectionStats {
                row_count: c.row_count(),
                partitions,
            })
        })
    }

    async fn list_ids_in_segment(&self, name: &str, segment: &str) -> StoreResult<Vec<VectorId>> {
        self.check("list_ids_in_segment", segment)?;
        self.with_collection(name, |c| {
            let seg = c.segments.iter().find(|s| s.name == segment).ok_or_else(|| {
                StoreError::status(
                    status_code::ILLEGAL_ARGUMENT,
                    format!("segment {segment} does not exist"),
                )
            })?;
            Ok(seg
                .rows
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| !c.tombstones.contains(id))
                .collect())
        })
    }

    async fn count_entities(&self, name: &str) -> StoreResult<u64> {
        self.check("count_entities", name)?;
        self.with_collection(name, |c| Ok(c.row_count()))
    }
}
