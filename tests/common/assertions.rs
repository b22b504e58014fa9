use semprint::error::{Result, SemprintError};
use semprint::types::{QueryResult, SentenceVector, VectorCount};
use semprint::VectorStoreManager;

/// Assert that a vector has unit L2 norm.
pub fn assert_unit_norm(v: &SentenceVector) {
    let norm = v.norm();
    assert!(
        (norm - 1.0).abs() < 1e-5,
        "expected unit norm, got {norm}"
    );
}

/// Assert that hits are ordered best-first for an inner-product collection.
pub fn assert_ranked_by_inner_product(hits: &QueryResult) {
    for pair in hits.windows(2) {
        assert!(
            pair[0].distance >= pair[1].distance,
            "hits out of order: {:?}",
            hits
        );
    }
}

/// Assert the total count of vectors in `names`.
pub async fn assert_count(manager: &VectorStoreManager, names: &[&str], expected: u64) {
    let count = manager
        .count_vectors(names)
        .await
        .expect("count_vectors failed");
    assert_eq!(
        count,
        VectorCount {
            total_count: expected,
            skipped: vec![],
        },
        "unexpected count for {names:?}"
    );
}

pub fn assert_dimension_mismatch<T: std::fmt::Debug>(result: &Result<T>) {
    match result {
        Err(SemprintError::DimensionMismatch { .. }) => {}
        other => panic!("expected DimensionMismatch error, got: {other:?}"),
    }
}

pub fn assert_collection_not_found<T: std::fmt::Debug>(result: &Result<T>) {
    match result {
        Err(SemprintError::CollectionNotFound { .. }) => {}
        other => panic!("expected CollectionNotFound error, got: {other:?}"),
    }
}
