//! Shared helpers for the integration tests.

use std::sync::Arc;

use atria::{Neighbor, PointSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded dimension-major tabular data in `[min, max)`.
pub fn tabular(car: usize, dim: usize, min: f64, max: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..car * dim).map(|_| rng.gen_range(min..max)).collect()
}

/// A seeded random dense point set in `[-1, 1)^dim`.
pub fn random_dense(car: usize, dim: usize, seed: u64) -> Arc<PointSet> {
    let data = tabular(car, dim, -1.0, 1.0, seed);
    Arc::new(PointSet::dense(data, dim).unwrap())
}

/// Asserts that two hit lists agree element-for-element.
///
/// Both searches compute distances through the same kernels, and both break
/// ties by ascending index, so the comparison can be exact.
pub fn check_hits(expected: &[Neighbor], actual: &[Neighbor], label: &str) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "{label}: hit count mismatch:\nexp {expected:?}\ngot {actual:?}",
    );
    for (i, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
        assert_eq!(e.index, a.index, "{label}: index mismatch at {i}:\nexp {expected:?}\ngot {actual:?}");
        assert!(
            float_cmp::approx_eq!(f64, e.distance, a.distance, ulps = 2),
            "{label}: distance mismatch at {i}: {} vs {}",
            e.distance,
            a.distance,
        );
    }
}
