use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static::lazy_static! {
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "semprint_store_operations_total", "Vector store operations", &["operation", "status"]
    ).unwrap();
    pub static ref STORE_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "semprint_store_operation_duration_seconds", "Vector store operation duration", &["operation"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
    pub static ref EMBEDDINGS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "semprint_embeddings_total", "Sentences embedded", &["result"]
    ).unwrap();
    pub static ref EMBEDDING_DURATION: HistogramVec = register_histogram_vec!(
        "semprint_embedding_duration_seconds", "Per-sentence embedding duration", &["result"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&STORE_OPERATIONS_TOTAL);
    lazy_static::initialize(&STORE_OPERATION_DURATION);
    lazy_static::initialize(&EMBEDDINGS_TOTAL);
    lazy_static::initialize(&EMBEDDING_DURATION);
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let mut buf = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buf) {
        tracing::warn!(error = %e, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
