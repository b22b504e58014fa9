//! Token-to-sentence reduction.

use crate::error::{Result, SemprintError};
use crate::types::SentenceVector;

/// Unweighted arithmetic mean over every token position.
///
/// All positions count, special tokens included. Accumulation runs in token
/// order starting from the first vector.
pub fn mean_pool(hidden: &[Vec<f32>], width: usize) -> Result<Vec<f32>> {
    let Some(first) = hidden.first() else {
        return Err(SemprintError::EmptyTokens);
    };

    let mut pooled = first.clone();
    check_width(&pooled, width)?;
    for token in &hidden[1..] {
        check_width(token, width)?;
        for (acc, v) in pooled.iter_mut().zip(token) {
            *acc += v;
        }
    }

    let count = hidden.len() as f32;
    for v in pooled.iter_mut() {
        *v /= count;
    }
    Ok(pooled)
}

fn check_width(vector: &[f32], width: usize) -> Result<()> {
    if vector.len() != width {
        return Err(SemprintError::DimensionMismatch {
            expected: width,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Scale to unit L2 norm. The norm is computed in f64.
///
/// A zero (or non-finite) norm is reported as `DegenerateEmbedding` instead of
/// producing NaN components.
pub fn l2_normalize(values: Vec<f32>) -> Result<SentenceVector> {
    let norm = values
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(SemprintError::DegenerateEmbedding);
    }
    let unit: Vec<f32> = values
        .into_iter()
        .map(|x| (f64::from(x) / norm) as f32)
        .collect();
    Ok(SentenceVector::from(unit))
}
