//! REST client for a Milvus-style vector index service.
//!
//! Every response body may carry `{"code": .., "message": ..}`; a non-zero code
//! is surfaced as `StoreError::Status`. Ids travel as decimal strings on the
//! wire and distances may be strings or numbers, so both are decoded leniently.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::types::{
    CollectionInfo, CollectionSchema, CollectionStats, IndexKind, MetricType, PartitionStats,
    QueryResult, SearchHit, SegmentStats, VectorId,
};

use super::status_code;
use super::traits::{IndexClient, SearchParams, StoreResult};

const PAGE_SIZE: usize = 1000;

pub struct HttpIndexClient {
    base_url: Url,
    http: reqwest::Client,
}

impl HttpIndexClient {
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let base_url = Url::parse(&config.base_url())?;
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(16)
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL, percent-encoding each one so a
    /// name can never add or climb path levels.
    fn url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> StoreResult<RequestBuilder> {
        Ok(self.http.request(method, self.url(segments)?))
    }

    /// Send a request and return the decoded body, mapping status codes.
    async fn call(&self, req: RequestBuilder) -> StoreResult<Value> {
        let resp = req.send().await?;
        let http_status = resp.status();
        let text = resp.text().await?;

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(_) if http_status.is_success() => {
                    return Err(StoreError::Decode(format!("non-json body: {text}")));
                }
                Err(_) => {
                    return Err(StoreError::status(
                        status_code::UNEXPECTED_ERROR,
                        format!("{http_status}: {text}"),
                    ));
                }
            }
        };

        if let Some(code) = body.get("code").and_then(Value::as_i64) {
            if code != status_code::SUCCESS {
                let message = body
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                return Err(StoreError::Status { code, message });
            }
        } else if !http_status.is_success() {
            return Err(StoreError::status(
                status_code::UNEXPECTED_ERROR,
                format!("{http_status}: {text}"),
            ));
        }

        Ok(body)
    }

    async fn get(&self, segments: &[&str]) -> StoreResult<Value> {
        self.call(self.request(Method::GET, segments)?).await
    }

    async fn send_json(&self, method: Method, segments: &[&str], body: Value) -> StoreResult<Value> {
        self.call(self.request(method, segments)?.json(&body)).await
    }

    /// Page through a listing endpoint, collecting `field` from each page.
    async fn paginate(&self, segments: &[&str], field: &str) -> StoreResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let req = self
                .request(Method::GET, segments)?
                .query(&[("offset", offset), ("page_size", PAGE_SIZE)]);
            let body = self.call(req).await?;
            let page = body
                .get(field)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let total = body.get("count").and_then(Value::as_u64).map(|c| c as usize);

            let fetched = page.len();
            items.extend(page);
            offset += fetched;

            let done = match total {
                Some(total) => offset >= total,
                None => fetched < PAGE_SIZE,
            };
            if done || fetched == 0 {
                return Ok(items);
            }
        }
    }
}

fn decode<T: for<'de> Deserialize<'de>>(value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Decode(e.to_string()))
}

fn as_id(value: &Value) -> StoreResult<VectorId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| StoreError::Decode(format!("invalid id: {value}")))
}

fn as_f32(value: &Value) -> StoreResult<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| StoreError::Decode(format!("invalid distance: {value}")))
}

fn as_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

/// A row count that must be present; unlike stats fields it is never
/// defaulted to zero.
fn parse_count(value: Option<&Value>) -> StoreResult<u64> {
    match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        StoreError::Decode(format!(
            "invalid count: {}",
            value.unwrap_or(&Value::Null)
        ))
    })
}

fn ids_to_wire(ids: &[VectorId]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[derive(Deserialize)]
struct DescribeBody {
    collection_name: String,
    dimension: usize,
    index_file_size: usize,
    metric_type: MetricType,
    #[serde(default)]
    index: Option<IndexKind>,
    #[serde(default)]
    count: u64,
}

#[async_trait]
impl IndexClient for HttpIndexClient {
    async fn server_status(&self) -> StoreResult<()> {
        self.get(&["state"]).await.map(|_| ())
    }

    async fn has_collection(&self, name: &str) -> StoreResult<bool> {
        match self.get(&["collections", name]).await {
            Ok(_) => Ok(true),
            Err(StoreError::Status { code, .. }) if code == status_code::COLLECTION_NOT_EXISTS => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> StoreResult<()> {
        let body = json!({
            "collection_name": schema.name,
            "dimension": schema.dimension,
            "index_file_size": schema.index_file_size,
            "metric_type": schema.metric,
        });
        self.send_json(Method::POST, &["collections"], body).await?;
        Ok(())
    }

    async fn describe_collection(&self, name: &str) -> StoreResult<CollectionInfo> {
        let body: DescribeBody = decode(self.get(&["collections", name]).await?)?;
        Ok(CollectionInfo {
            name: body.collection_name,
            dimension: body.dimension,
            index_file_size: body.index_file_size,
            metric: body.metric_type,
            index: body.index,
            row_count: body.count,
        })
    }

    async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.call(self.request(Method::DELETE, &["collections", name])?)
            .await?;
        Ok(())
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.paginate(&["collections"], "collections")
            .await?
            .iter()
            .map(|c| {
                c.get("collection_name")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::Decode(format!("invalid collection entry: {c}")))
            })
            .collect()
    }

    async fn create_index(&self, name: &str, kind: IndexKind, nlist: usize) -> StoreResult<()> {
        let body = json!({
            "index_type": kind,
            "params": { "nlist": nlist },
        });
        self.send_json(Method::POST, &["collections", name, "indexes"], body)
            .await?;
        Ok(())
    }

    async fn create_partition(&self, name: &str, tag: &str) -> StoreResult<()> {
        let body = json!({ "partition_tag": tag });
        self.send_json(
            Method::POST,
            &["collections", name, "partitions"],
            body,
        )
        .await?;
        Ok(())
    }

    async fn list_partitions(&self, name: &str) -> StoreResult<Vec<String>> {
        self.paginate(&["collections", name, "partitions"], "partitions")
            .await?
            .iter()
            .map(|p| {
                p.get("partition_tag")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| StoreError::Decode(format!("invalid partition entry: {p}")))
            })
            .collect()
    }

    async fn insert(
        &self,
        name: &str,
        partition: Option<&str>,
        ids: &[VectorId],
        vectors: &[&[f32]],
    ) -> StoreResult<Vec<VectorId>> {
        let mut body = json!({
            "vectors": vectors,
            "ids": ids_to_wire(ids),
        });
        if let Some(tag) = partition {
            body["partition_tag"] = json!(tag);
        }
        let resp = self
            .send_json(Method::POST, &["collections", name, "vectors"], body)
            .await?;

        let inserted = resp
            .get("ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(as_id).collect::<StoreResult<Vec<_>>>())
            .transpose()?
            .unwrap_or_else(|| ids.to_vec());
        debug!(collection = name, inserted = inserted.len(), "insert acknowledged");
        Ok(inserted)
    }

    async fn delete_by_id(&self, name: &str, ids: &[VectorId]) -> StoreResult<()> {
        let body = json!({ "delete": { "ids": ids_to_wire(ids) } });
        self.send_json(Method::PUT, &["collections", name, "vectors"], body)
            .await?;
        Ok(())
    }

    async fn flush(&self, names: &[&str]) -> StoreResult<()> {
        let body = json!({ "flush": { "collection_names": names } });
        self.send_json(Method::PUT, &["system", "task"], body).await?;
        Ok(())
    }

    async fn compact(&self, name: &str) -> StoreResult<()> {
        let body = json!({ "compact": { "collection_name": name } });
        self.send_json(Method::PUT, &["system", "task"], body).await?;
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        partitions: &[&str],
        queries: &[&[f32]],
        params: &SearchParams,
    ) -> StoreResult<Vec<QueryResult>> {
        let mut search = json!({
            "topk": params.top_k,
            "vectors": queries,
            "params": { "nprobe": params.nprobe },
        });
        if !partitions.is_empty() {
            search["partition_tags"] = json!(partitions);
        }
        let resp = self
            .send_json(
                Method::PUT,
                &["collections", name, "vectors"],
                json!({ "search": search }),
            )
            .await?;

        let rows = match resp.get("result") {
            Some(Value::Array(rows)) => rows.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(StoreError::Decode(format!("invalid search result: {other}")));
            }
        };

        let mut results: Vec<QueryResult> = rows
            .iter()
            .map(|row| {
                row.as_array()
                    .map(|hits| hits.as_slice())
                    .unwrap_or_default()
                    .iter()
                    .map(|hit| {
                        Ok(SearchHit {
                            id: as_id(hit.get("id").unwrap_or(&Value::Null))?,
                            distance: as_f32(hit.get("distance").unwrap_or(&Value::Null))?,
                        })
                    })
                    .collect::<StoreResult<QueryResult>>()
            })
            .collect::<StoreResult<_>>()?;

        // An empty collection may answer with fewer rows than queries.
        results.resize_with(queries.len(), Vec::new);
        Ok(results)
    }

    async fn collection_stats(&self, name: &str) -> StoreResult<CollectionStats> {
        let req = self
            .request(Method::GET, &["collections", name])?
            .query(&[("info", "stat")]);
        let body = self.call(req).await?;

        let partitions = body
            .get("partitions")
            .and_then(Value::as_array)
            .map(|ps| ps.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|p| {
                let segments = p.get("segments").and_then(Value::as_array).map(|segs| {
                    segs.iter()
                        .filter_map(|s| {
                            Some(SegmentStats {
                                name: s.get("name")?.as_str()?.to_string(),
                                row_count: as_u64(s.get("row_count")),
                            })
                        })
                        .collect()
                });
                PartitionStats {
                    tag: p
                        .get("tag")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    row_count: as_u64(p.get("row_count")),
                    segments,
                }
            })
            .collect();

        Ok(CollectionStats {
            row_count: as_u64(body.get("row_count")),
            partitions,
        })
    }

    async fn list_ids_in_segment(&self, name: &str, segment: &str) -> StoreResult<Vec<VectorId>> {
        self.paginate(
            &["collections", name, "segments", segment, "ids"],
            "ids",
        )
        .await?
        .iter()
        .map(as_id)
        .collect()
    }

    async fn count_entities(&self, name: &str) -> StoreResult<u64> {
        let body = self.get(&["collections", name]).await?;
        parse_count(body.get("count"))
    }
}
