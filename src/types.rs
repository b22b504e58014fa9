use serde::{Deserialize, Serialize};

/// Caller-assigned primary key of a vector within a collection.
pub type VectorId = i64;

/// Similarity metric a collection is created with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricType {
    /// Inner product. Larger is closer; with unit vectors this is cosine similarity.
    #[default]
    #[serde(rename = "IP")]
    InnerProduct,
    #[serde(rename = "L2")]
    Euclidean,
}

impl MetricType {
    /// Whether a larger distance value means a closer match.
    pub fn higher_is_closer(self) -> bool {
        matches!(self, MetricType::InnerProduct)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricType::InnerProduct => write!(f, "IP"),
            MetricType::Euclidean => write!(f, "L2"),
        }
    }
}

/// Index kind built on a collection at creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    #[serde(rename = "FLAT")]
    Flat,
    #[serde(rename = "IVFFLAT")]
    IvfFlat,
    #[default]
    #[serde(rename = "IVFSQ8")]
    IvfSq8,
    #[serde(rename = "IVFPQ")]
    IvfPq,
    /// Any index the service reports that semprint never builds itself.
    #[serde(rename = "OTHER")]
    #[serde(other)]
    Other,
}

impl std::fmt::Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexKind::Flat => write!(f, "FLAT"),
            IndexKind::IvfFlat => write!(f, "IVFFLAT"),
            IndexKind::IvfSq8 => write!(f, "IVFSQ8"),
            IndexKind::IvfPq => write!(f, "IVFPQ"),
            IndexKind::Other => write!(f, "OTHER"),
        }
    }
}

/// A sentence fingerprint. Vectors produced by the embedder have unit L2 norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentenceVector(Vec<f32>);

impl SentenceVector {
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    pub fn norm(&self) -> f32 {
        l2_norm(&self.0)
    }
}

impl From<Vec<f32>> for SentenceVector {
    fn from(values: Vec<f32>) -> Self {
        SentenceVector(values)
    }
}

impl AsRef<[f32]> for SentenceVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

pub(crate) fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// A vector tagged with its id, as handed to `insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: VectorId,
    pub vector: SentenceVector,
}

impl VectorRecord {
    pub fn new(id: VectorId, vector: impl Into<SentenceVector>) -> Self {
        Self {
            id,
            vector: vector.into(),
        }
    }
}

/// One ranked neighbor of a query vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: VectorId,
    pub distance: f32,
}

/// Ranked hits for a single query vector, at most `top_k` long.
pub type QueryResult = Vec<SearchHit>;

/// Collection description as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub index_file_size: usize,
    pub metric: MetricType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<IndexKind>,
    pub row_count: u64,
}

/// Parameters for creating a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: usize,
    pub index_file_size: usize,
    pub metric: MetricType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    pub name: String,
    pub row_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub tag: String,
    pub row_count: u64,
    /// `None` when the store has not materialized any segment yet.
    #[serde(default)]
    pub segments: Option<Vec<SegmentStats>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub row_count: u64,
    pub partitions: Vec<PartitionStats>,
}

/// Aggregate vector count across collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorCount {
    pub total_count: u64,
    /// Collections whose count could not be read and were left out of the total.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl VectorCount {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}

/// All ids stored in a collection, gathered segment by segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdListing {
    pub ids: Vec<VectorId>,
    /// Segments whose id list could not be read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable_segments: Vec<String>,
}

impl NodeIdListing {
    pub fn is_partial(&self) -> bool {
        !self.unreadable_segments.is_empty()
    }
}
