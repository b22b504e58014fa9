use thiserror::Error;

/// Failure reported by the external index service or the transport to it.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The service answered with a non-zero status code.
    #[error("status {code}: {message}")]
    Status { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("malformed response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn status(code: i64, message: impl Into<String>) -> Self {
        StoreError::Status {
            code,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SemprintError {
    // Initialization errors
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    // Store errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    // Embedding errors
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("tokenizer produced no tokens")]
    EmptyTokens,

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("degenerate embedding: pooled vector has zero norm")]
    DegenerateEmbedding,

    #[error("sentence {index}: {source}")]
    Sentence {
        index: usize,
        #[source]
        source: Box<SemprintError>,
    },

    // Validation errors
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("validation error: {0}")]
    Validation(String),

    // Config errors
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SemprintError>;

impl SemprintError {
    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SemprintError::StoreUnavailable { .. } => "unavailable",
            SemprintError::ModelUnavailable(_) => "model_unavailable",
            SemprintError::Store(_) => "store",
            SemprintError::CollectionNotFound { .. } => "not_found",
            SemprintError::Tokenization(_) | SemprintError::EmptyTokens => "tokenization",
            SemprintError::Inference(_) => "inference",
            SemprintError::DegenerateEmbedding => "degenerate",
            SemprintError::Sentence { source, .. } => source.kind(),
            SemprintError::DimensionMismatch { .. } | SemprintError::Validation(_) => {
                "validation"
            }
            SemprintError::Config(_) => "config",
            SemprintError::Io(_) | SemprintError::Json(_) => "internal",
        }
    }
}
