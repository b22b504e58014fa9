//! REST facade over `MemoryIndexClient`, served on a random local port.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use semprint::config::StoreConfig;
use semprint::error::StoreError;
use semprint::store::{status_code, IndexClient, MemoryIndexClient, SearchParams};
use semprint::types::{CollectionSchema, IndexKind, MetricType, VectorId};

type Backend = Arc<MemoryIndexClient>;
type Params = Query<HashMap<String, String>>;
type Reply = (StatusCode, Json<Value>);

pub struct MockStore {
    pub backend: Backend,
    pub config: StoreConfig,
}

/// Start the mock service and return its backend plus a config pointing at it.
pub async fn start_mock_store() -> MockStore {
    let backend: Backend = Arc::new(MemoryIndexClient::new());

    let app = Router::new()
        .route("/state", get(state))
        .route("/collections", get(list_collections).post(create_collection))
        .route(
            "/collections/:name",
            get(get_collection).delete(drop_collection),
        )
        .route("/collections/:name/indexes", post(create_index))
        .route(
            "/collections/:name/partitions",
            get(list_partitions).post(create_partition),
        )
        .route(
            "/collections/:name/vectors",
            post(insert_vectors).put(vector_task),
        )
        .route("/collections/:name/segments/:segment/ids", get(segment_ids))
        .route("/system/task", put(system_task))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockStore {
        backend,
        config: StoreConfig {
            host: addr.ip().to_string(),
            port: addr.port(),
        },
    }
}

/// Config pointing at a port nothing listens on.
pub async fn dead_store_config() -> StoreConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    StoreConfig {
        host: "127.0.0.1".to_string(),
        port,
    }
}

fn success() -> Reply {
    (
        StatusCode::OK,
        Json(json!({ "code": status_code::SUCCESS, "message": "Success" })),
    )
}

fn failure(e: StoreError) -> Reply {
    match e {
        StoreError::Status { code, message } => {
            let http = if code == status_code::COLLECTION_NOT_EXISTS {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::BAD_REQUEST
            };
            (http, Json(json!({ "code": code, "message": message })))
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "code": status_code::UNEXPECTED_ERROR, "message": other.to_string() })),
        ),
    }
}

fn reply<T>(result: Result<T, StoreError>, f: impl FnOnce(T) -> Value) -> Reply {
    match result {
        Ok(v) => (StatusCode::OK, Json(f(v))),
        Err(e) => failure(e),
    }
}

fn bad_request(message: &str) -> Reply {
    failure(StoreError::status(status_code::ILLEGAL_ARGUMENT, message))
}

/// Slice `items` according to `offset`/`page_size` query params.
fn page(items: Vec<Value>, field: &str, params: &HashMap<String, String>) -> Value {
    let offset: usize = params.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let size: usize = params
        .get("page_size")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let total = items.len();
    let page: Vec<Value> = items.into_iter().skip(offset).take(size).collect();
    json!({ field: page, "count": total })
}

fn parse_ids(value: &Value) -> Option<Vec<VectorId>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str()?.parse().ok())
        .collect()
}

async fn state() -> Reply {
    success()
}

async fn list_collections(State(b): State<Backend>, Query(params): Params) -> Reply {
    match b.list_collections().await {
        Ok(names) => {
            let items = names
                .into_iter()
                .map(|n| json!({ "collection_name": n }))
                .collect();
            (StatusCode::OK, Json(page(items, "collections", &params)))
        }
        Err(e) => failure(e),
    }
}

async fn create_collection(State(b): State<Backend>, Json(body): Json<Value>) -> Reply {
    let schema = CollectionSchema {
        name: body["collection_name"].as_str().unwrap_or_default().to_string(),
        dimension: body["dimension"].as_u64().unwrap_or(0) as usize,
        index_file_size: body["index_file_size"].as_u64().unwrap_or(1024) as usize,
        metric: serde_json::from_value::<MetricType>(body["metric_type"].clone())
            .unwrap_or_default(),
    };
    match b.create_collection(&schema).await {
        Ok(()) => (StatusCode::CREATED, success().1),
        Err(e) => failure(e),
    }
}

async fn get_collection(
    State(b): State<Backend>,
    Path(name): Path<String>,
    Query(params): Params,
) -> Reply {
    if params.get("info").map(String::as_str) == Some("stat") {
        return reply(b.collection_stats(&name).await, |stats| {
            let partitions: Vec<Value> = stats
                .partitions
                .iter()
                .map(|p| {
                    let segments = p.segments.as_ref().map(|segs| {
                        segs.iter()
                            .map(|s| json!({ "name": s.name, "row_count": s.row_count }))
                            .collect::<Vec<_>>()
                    });
                    json!({ "tag": p.tag, "row_count": p.row_count, "segments": segments })
                })
                .collect();
            json!({ "row_count": stats.row_count, "partitions": partitions })
        });
    }

    reply(b.describe_collection(&name).await, |info| {
        let mut body = json!({
            "collection_name": info.name,
            "dimension": info.dimension,
            "index_file_size": info.index_file_size,
            "metric_type": info.metric,
            "count": info.row_count,
        });
        if let Some(index) = info.index {
            body["index"] = json!(index);
        }
        body
    })
}

async fn drop_collection(State(b): State<Backend>, Path(name): Path<String>) -> Reply {
    match b.drop_collection(&name).await {
        Ok(()) => (StatusCode::NO_CONTENT, Json(Value::Null)),
        Err(e) => failure(e),
    }
}

async fn create_index(
    State(b): State<Backend>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let Ok(kind) = serde_json::from_value::<IndexKind>(body["index_type"].clone()) else {
        return failure(StoreError::status(
            status_code::ILLEGAL_INDEX_TYPE,
            "unknown index type",
        ));
    };
    let nlist = body["params"]["nlist"].as_u64().unwrap_or(0) as usize;
    match b.create_index(&name, kind, nlist).await {
        Ok(()) => success(),
        Err(e) => failure(e),
    }
}

async fn list_partitions(
    State(b): State<Backend>,
    Path(name): Path<String>,
    Query(params): Params,
) -> Reply {
    match b.list_partitions(&name).await {
        Ok(tags) => {
            let items = tags
                .into_iter()
                .map(|t| json!({ "partition_tag": t }))
                .collect();
            (StatusCode::OK, Json(page(items, "partitions", &params)))
        }
        Err(e) => failure(e),
    }
}

async fn create_partition(
    State(b): State<Backend>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let tag = body["partition_tag"].as_str().unwrap_or_default();
    match b.create_partition(&name, tag).await {
        Ok(()) => success(),
        Err(e) => failure(e),
    }
}

async fn insert_vectors(
    State(b): State<Backend>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let Some(ids) = parse_ids(&body["ids"]) else {
        return bad_request("ids must be decimal strings");
    };
    let Ok(vectors) = serde_json::from_value::<Vec<Vec<f32>>>(body["vectors"].clone()) else {
        return bad_request("invalid vectors");
    };
    let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
    let partition = body["partition_tag"].as_str();
    reply(b.insert(&name, partition, &ids, &refs).await, |ids| {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        json!({ "ids": ids })
    })
}

async fn vector_task(
    State(b): State<Backend>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    if let Some(delete) = body.get("delete") {
        let Some(ids) = parse_ids(&delete["ids"]) else {
            return bad_request("ids must be decimal strings");
        };
        return match b.delete_by_id(&name, &ids).await {
            Ok(()) => success(),
            Err(e) => failure(e),
        };
    }

    let Some(search) = body.get("search") else {
        return bad_request("expected search or delete");
    };
    let Ok(vectors) = serde_json::from_value::<Vec<Vec<f32>>>(search["vectors"].clone()) else {
        return bad_request("invalid vectors");
    };
    let refs: Vec<&[f32]> = vectors.iter().map(Vec::as_slice).collect();
    let tags: Vec<String> = search["partition_tags"]
        .as_array()
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
    let params = SearchParams {
        top_k: search["topk"].as_u64().unwrap_or(0) as usize,
        nprobe: search["params"]["nprobe"].as_u64().unwrap_or(0) as usize,
    };

    reply(
        b.search(&name, &tag_refs, &refs, &params).await,
        |results| {
            let rows: Vec<Value> = results
                .iter()
                .map(|hits| {
                    hits.iter()
                        .map(|h| json!({ "id": h.id.to_string(), "distance": h.distance.to_string() }))
                        .collect()
                })
                .collect();
            json!({ "num": rows.len(), "result": rows })
        },
    )
}

async fn segment_ids(
    State(b): State<Backend>,
    Path((name, segment)): Path<(String, String)>,
    Query(params): Params,
) -> Reply {
    match b.list_ids_in_segment(&name, &segment).await {
        Ok(ids) => {
            let items = ids.into_iter().map(|id| json!(id.to_string())).collect();
            (StatusCode::OK, Json(page(items, "ids", &params)))
        }
        Err(e) => failure(e),
    }
}

async fn system_task(State(b): State<Backend>, Json(body): Json<Value>) -> Reply {
    if let Some(flush) = body.get("flush") {
        let names: Vec<String> = flush["collection_names"]
            .as_array()
            .map(|ns| {
                ns.iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        return match b.flush(&refs).await {
            Ok(()) => success(),
            Err(e) => failure(e),
        };
    }
    if let Some(compact) = body.get("compact") {
        let name = compact["collection_name"].as_str().unwrap_or_default();
        return match b.compact(name).await {
            Ok(()) => success(),
            Err(e) => failure(e),
        };
    }
    bad_request("unknown task")
}
