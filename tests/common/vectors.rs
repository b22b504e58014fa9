use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use semprint::types::{SentenceVector, VectorId, VectorRecord};

/// `n` random unit vectors of dimension `dims`, seeded for reproducibility.
pub fn unit_vectors(n: usize, dims: usize, seed: u64) -> Vec<SentenceVector> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            SentenceVector::from(v.iter().map(|x| x / norm).collect::<Vec<f32>>())
        })
        .collect()
}

/// Unit vector along axis `axis`.
pub fn basis_vector(dims: usize, axis: usize) -> SentenceVector {
    let mut v = vec![0.0f32; dims];
    v[axis] = 1.0;
    SentenceVector::from(v)
}

/// Records with ids `first_id..` for the given vectors.
pub fn records(first_id: VectorId, vectors: Vec<SentenceVector>) -> Vec<VectorRecord> {
    vectors
        .into_iter()
        .enumerate()
        .map(|(i, v)| VectorRecord::new(first_id + i as VectorId, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_vectors() {
        let vecs = unit_vectors(5, 64, 7);
        assert_eq!(vecs.len(), 5);
        assert_eq!(vecs[0].dimension(), 64);
        assert!((vecs[0].norm() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_records_assign_sequential_ids() {
        let recs = records(10, unit_vectors(3, 4, 1));
        let ids: Vec<VectorId> = recs.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }
}
