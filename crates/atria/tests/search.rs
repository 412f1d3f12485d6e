//! Cross-validation of the tree searches against the linear oracle, plus
//! the documented boundary behaviors.

mod common;

use std::sync::Arc;

use atria::{search::linear, BuildParams, Error, Index, Metric, PointSet, QueryMatrix, SearchContext};
use float_cmp::approx_eq;
use test_case::test_case;

fn build(points: &Arc<PointSet>, metric: Metric, min_points: usize) -> Index {
    Index::build(Arc::clone(points), metric, &BuildParams::new(min_points)).unwrap()
}

#[test_case(10, 2, 4; "10x2")]
#[test_case(200, 3, 8; "200x3")]
#[test_case(1_000, 2, 16; "1_000x2")]
#[test_case(2_000, 10, 64; "2_000x10")]
fn agrees_with_linear(car: usize, dim: usize, min_points: usize) {
    let points = common::random_dense(car, dim, 42);
    let index = build(&points, Metric::Euclidean, min_points);
    let mut ctx = SearchContext::new();

    let query_data = common::tabular(5, dim, -1.5, 1.5, 43);
    let queries = QueryMatrix::new(&query_data, dim).unwrap();

    for query in queries.columns() {
        for k in [1, 10, car, car + 7] {
            let expected = linear::knn(&points, Metric::Euclidean, query, k).unwrap();
            let actual = index.knn_with(&mut ctx, query, k).unwrap();
            common::check_hits(&expected, &actual, &format!("knn(k={k})"));
            assert_eq!(actual.len(), k.min(car));
        }

        for radius in [0.1, 0.5, 1.0, 2.0] {
            let expected = linear::range(&points, Metric::Euclidean, query, radius).unwrap();
            let actual = index.range_with(&mut ctx, query, radius).unwrap();
            common::check_hits(&expected, &actual, &format!("range(r={radius})"));

            let count = index.count_range_with(&mut ctx, query, radius).unwrap();
            assert_eq!(count, actual.len(), "count_range disagrees with range(r={radius})");
        }
    }
}

#[test_case(Metric::Maximum; "maximum")]
#[test_case(Metric::exponentially_weighted(0.5).unwrap(); "exp_weighted")]
fn agrees_with_linear_under(metric: Metric) {
    let points = common::random_dense(800, 6, 7);
    let index = build(&points, metric, 16);
    let mut ctx = SearchContext::new();

    let query_data = common::tabular(4, 6, -1.0, 1.0, 8);
    let queries = QueryMatrix::new(&query_data, 6).unwrap();

    for query in queries.columns() {
        for k in [1, 5, 50] {
            let expected = linear::knn(&points, metric, query, k).unwrap();
            let actual = index.knn_with(&mut ctx, query, k).unwrap();
            common::check_hits(&expected, &actual, &format!("{} knn(k={k})", metric.name()));
        }
        let expected = linear::range(&points, metric, query, 0.7).unwrap();
        let actual = index.range_with(&mut ctx, query, 0.7).unwrap();
        common::check_hits(&expected, &actual, &format!("{} range", metric.name()));
    }
}

#[test]
fn unit_square_corners() {
    let data = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    let points = Arc::new(PointSet::dense(data, 2).unwrap());
    let index = build(&points, Metric::Euclidean, 1);

    let hits = index.knn(&[0.1, 0.1], 2).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].index, 0);
    assert!(approx_eq!(f64, hits[0].distance, 0.02_f64.sqrt(), ulps = 2));
    assert_eq!(hits[1].index, 1, "equal corner distances must resolve by ascending index");
    assert!(approx_eq!(f64, hits[1].distance, 0.82_f64.sqrt(), ulps = 2));
}

#[test]
fn one_dimensional_line() {
    let points = Arc::new(PointSet::dense(vec![1.0, 2.0, 3.0, 4.0, 5.0], 1).unwrap());
    let index = build(&points, Metric::Euclidean, 2);

    let hits = index.knn(&[3.5], 3).unwrap();
    assert_eq!(
        hits.iter().map(|n| n.index).collect::<Vec<_>>(),
        vec![2, 3, 1],
        "the 0.5-distance tie must resolve by ascending index",
    );
    assert!(approx_eq!(f64, hits[0].distance, 0.5, ulps = 2));
    assert!(approx_eq!(f64, hits[1].distance, 0.5, ulps = 2));
    assert!(approx_eq!(f64, hits[2].distance, 1.5, ulps = 2));
}

#[test]
fn coincident_points() {
    let points = Arc::new(PointSet::dense(vec![0.0; 30], 3).unwrap());
    let index = build(&points, Metric::Euclidean, 4);

    let hits = index.knn(&[0.0, 0.0, 0.0], 5).unwrap();
    assert_eq!(hits.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    assert!(hits.iter().all(|n| n.distance == 0.0));
}

#[test]
fn self_queries_return_self() {
    let points = common::random_dense(100, 10, 11);
    let index = build(&points, Metric::Euclidean, 8);
    let mut ctx = SearchContext::new();
    let mut query = vec![0.0; 10];

    for i in 0..points.len() {
        points.copy_point_into(i, &mut query);
        let hits = index.knn_with(&mut ctx, &query, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, i);
        assert_eq!(hits[0].distance, 0.0);
    }
}

#[test]
fn range_and_count_agree() {
    let points = common::random_dense(200, 5, 5);
    let index = build(&points, Metric::Euclidean, 16);
    let query = common::tabular(1, 5, -1.0, 1.0, 6);

    let hits = index.range(&query, 0.8).unwrap();
    assert_eq!(index.count_range(&query, 0.8).unwrap(), hits.len());
    assert!(hits.windows(2).all(|w| w[0] <= w[1]), "range hits must be sorted");
}

#[test]
fn maximum_metric_ties() {
    let data = vec![0.0, 0.0, 0.0, 1.0, 5.0, 2.0, 5.0, 5.0, 5.0];
    let points = Arc::new(PointSet::dense(data, 3).unwrap());
    let index = build(&points, Metric::Maximum, 1);

    let hits = index.knn(&[0.0, 0.0, 0.0], 3).unwrap();
    assert_eq!(hits.iter().map(|n| n.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(hits.iter().map(|n| n.distance).collect::<Vec<_>>(), vec![0.0, 5.0, 5.0]);
}

#[test]
fn single_point() {
    let points = Arc::new(PointSet::dense(vec![3.0, 4.0], 2).unwrap());
    let index = build(&points, Metric::Euclidean, 64);
    assert_eq!(index.len(), 1);

    let hits = index.knn(&[0.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].index, 0);
    assert!(approx_eq!(f64, hits[0].distance, 5.0, ulps = 2));

    let hits = index.knn(&[0.0, 0.0], 10).unwrap();
    assert_eq!(hits.len(), 1, "k beyond N returns every point");
}

#[test]
fn collinear_points() {
    let data = (0..64).flat_map(|i| [f64::from(i), 2.0 * f64::from(i)]).collect::<Vec<_>>();
    let points = Arc::new(PointSet::dense(data, 2).unwrap());
    let index = build(&points, Metric::Euclidean, 4);
    let mut ctx = SearchContext::new();

    for query in [[0.0, 0.0], [31.5, 63.0], [100.0, -3.0]] {
        for k in [1, 7, 64] {
            let expected = linear::knn(&points, Metric::Euclidean, &query, k).unwrap();
            let actual = index.knn_with(&mut ctx, &query, k).unwrap();
            common::check_hits(&expected, &actual, &format!("collinear knn(k={k})"));
        }
    }
}

#[test_case(1e-10; "tiny_scale")]
#[test_case(1e10; "huge_scale")]
fn extreme_coordinate_scales(scale: f64) {
    let data = common::tabular(300, 4, -scale, scale, 23);
    let points = Arc::new(PointSet::dense(data, 4).unwrap());
    let index = build(&points, Metric::Euclidean, 16);
    let mut ctx = SearchContext::new();

    let query = vec![0.5 * scale; 4];
    let expected = linear::knn(&points, Metric::Euclidean, &query, 10).unwrap();
    let actual = index.knn_with(&mut ctx, &query, 10).unwrap();
    common::check_hits(&expected, &actual, "scaled knn");

    let radius = 0.5 * scale;
    let expected = linear::range(&points, Metric::Euclidean, &query, radius).unwrap();
    let actual = index.range_with(&mut ctx, &query, radius).unwrap();
    common::check_hits(&expected, &actual, "scaled range");
}

#[test]
fn query_far_outside_the_hull() {
    let points = common::random_dense(500, 3, 31);
    let index = build(&points, Metric::Euclidean, 16);

    let query = [1e6, -1e6, 1e6];
    let expected = linear::knn(&points, Metric::Euclidean, &query, 5).unwrap();
    let actual = index.knn(&query, 5).unwrap();
    common::check_hits(&expected, &actual, "distant knn");

    assert!(index.range(&query, 1.0).unwrap().is_empty());
    assert_eq!(index.count_range(&query, 1.0).unwrap(), 0);
}

#[test]
fn exclusion_window_is_invisible() {
    let points = common::random_dense(300, 4, 17);
    let index = build(&points, Metric::Euclidean, 16);
    let mut ctx = SearchContext::new();
    let mut query = vec![0.0; 4];

    for i in [0, 150, 299] {
        points.copy_point_into(i, &mut query);
        let first = i.saturating_sub(5);
        let last = (i + 5).min(299);

        // The oracle: rank everything, then drop the excluded window.
        let expected = linear::knn(&points, Metric::Euclidean, &query, 300)
            .unwrap()
            .into_iter()
            .filter(|n| n.index < first || n.index > last)
            .take(10)
            .collect::<Vec<_>>();

        let actual = index.knn_excluding(&mut ctx, &query, 10, first..=last).unwrap();
        common::check_hits(&expected, &actual, &format!("knn_excluding around {i}"));
        assert!(actual.iter().all(|n| n.index < first || n.index > last));

        let expected = linear::range(&points, Metric::Euclidean, &query, 0.9)
            .unwrap()
            .into_iter()
            .filter(|n| n.index < first || n.index > last)
            .collect::<Vec<_>>();
        let actual = index.range_excluding(&mut ctx, &query, 0.9, first..=last).unwrap();
        common::check_hits(&expected, &actual, &format!("range_excluding around {i}"));
        assert_eq!(
            index.count_range_excluding(&mut ctx, &query, 0.9, first..=last).unwrap(),
            actual.len(),
        );
    }
}

#[test]
fn excluding_everything_returns_nothing() {
    let points = common::random_dense(50, 3, 3);
    let index = build(&points, Metric::Euclidean, 8);
    let mut ctx = SearchContext::new();

    let hits = index.knn_excluding(&mut ctx, &[0.0, 0.0, 0.0], 5, 0..=49).unwrap();
    assert!(hits.is_empty());
    assert_eq!(index.count_range_excluding(&mut ctx, &[0.0, 0.0, 0.0], 10.0, 0..=49).unwrap(), 0);
}

#[test]
fn batches_match_single_queries() {
    let points = common::random_dense(1_000, 5, 29);
    let index = build(&points, Metric::Euclidean, 32);

    let query_data = common::tabular(20, 5, -1.0, 1.0, 30);
    let queries = QueryMatrix::new(&query_data, 5).unwrap();

    let serial = index.batch_knn(&queries, 8).unwrap();
    let parallel = index.par_batch_knn(&queries, 8).unwrap();
    assert_eq!(serial.len(), queries.len());
    assert_eq!(parallel.len(), queries.len());

    for (j, query) in queries.columns().enumerate() {
        let single = index.knn(query, 8).unwrap();
        common::check_hits(&single, &serial[j], &format!("serial batch query {j}"));
        common::check_hits(&single, &parallel[j], &format!("parallel batch query {j}"));
    }
}

#[test]
fn identical_builds_answer_identically() {
    let points = common::random_dense(400, 4, 19);
    let params = BuildParams::new(16).with_seed(7);
    let a = Index::build(Arc::clone(&points), Metric::Euclidean, &params).unwrap();
    let b = Index::build(Arc::clone(&points), Metric::Euclidean, &params).unwrap();

    assert_eq!(a.permutation().len(), b.permutation().len());
    for (x, y) in a.permutation().iter().zip(b.permutation().iter()) {
        assert_eq!(x.index, y.index);
    }

    let query = common::tabular(1, 4, -1.0, 1.0, 20);
    assert_eq!(a.knn(&query, 12).unwrap(), b.knn(&query, 12).unwrap());
}

#[test]
fn embedding_matches_materialized_dense() {
    let series = common::tabular(64, 1, -2.0, 2.0, 47);
    let (dim, delay) = (3, 2);
    let embedded = Arc::new(PointSet::delay_embedding(series.clone(), dim, delay).unwrap());

    // Materialize the same embedding as a dense matrix.
    let n = embedded.len();
    let mut data = vec![0.0; n * dim];
    for i in 0..n {
        embedded.copy_point_into(i, &mut data[i * dim..(i + 1) * dim]);
    }
    let dense = Arc::new(PointSet::dense(data, dim).unwrap());

    let params = BuildParams::new(8).with_seed(3);
    let from_series = Index::build(Arc::clone(&embedded), Metric::Euclidean, &params).unwrap();
    let from_matrix = Index::build(Arc::clone(&dense), Metric::Euclidean, &params).unwrap();

    let mut ctx = SearchContext::new();
    let mut query = vec![0.0; dim];
    for i in [0, n / 2, n - 1] {
        embedded.copy_point_into(i, &mut query);
        let a = from_series.knn_with(&mut ctx, &query, 5).unwrap();
        let b = from_matrix.knn_with(&mut ctx, &query, 5).unwrap();
        common::check_hits(&a, &b, &format!("embedding vs dense, query {i}"));
    }
}

#[test]
fn stats_track_pruning() {
    let points = common::random_dense(2_000, 3, 37);
    let index = build(&points, Metric::Euclidean, 32);
    let mut ctx = SearchContext::new();
    let query = [0.0, 0.0, 0.0];

    // Disabled by default: counters stay zero.
    index.knn_with(&mut ctx, &query, 10).unwrap();
    assert_eq!(ctx.stats().distance_calcs, 0);
    assert_eq!(ctx.stats().clusters_visited, 0);

    ctx.track_stats(true);
    index.knn_with(&mut ctx, &query, 10).unwrap();
    let stats = ctx.stats();
    assert!(stats.distance_calcs >= 10);
    assert!(stats.clusters_visited >= 1);
    // Low intrinsic dimension: pruning must beat the linear scan clearly.
    assert!(
        stats.f_k(points.len()) < 0.5,
        "expected heavy pruning, got f_k = {}",
        stats.f_k(points.len()),
    );
}

#[test]
fn parameter_errors() {
    let points = common::random_dense(50, 3, 1);
    let index = build(&points, Metric::Euclidean, 8);
    let mut ctx = SearchContext::new();

    assert!(matches!(index.knn(&[0.0, 0.0, 0.0], 0), Err(Error::InvalidParameter { .. })));
    assert!(matches!(
        index.knn(&[0.0, 0.0], 1),
        Err(Error::DimensionMismatch { expected: 3, actual: 2 }),
    ));
    assert!(matches!(
        index.range_with(&mut ctx, &[0.0, 0.0, 0.0], -0.5),
        Err(Error::InvalidParameter { .. }),
    ));
    assert!(matches!(
        Index::build(Arc::clone(&points), Metric::SquaredEuclidean, &BuildParams::default()),
        Err(Error::InvalidParameter { .. }),
    ));
    assert!(matches!(
        Index::build(Arc::clone(&points), Metric::Euclidean, &BuildParams::new(0)),
        Err(Error::InvalidParameter { .. }),
    ));
}

#[test]
fn squared_euclidean_works_linearly() {
    let points = common::random_dense(100, 4, 53);
    let query = [0.1, -0.2, 0.3, -0.4];

    let hits = linear::knn(&points, Metric::SquaredEuclidean, &query, 5).unwrap();
    let reference = linear::knn(&points, Metric::Euclidean, &query, 5).unwrap();
    // Squaring is monotone, so the ranking agrees with Euclidean.
    assert_eq!(
        hits.iter().map(|n| n.index).collect::<Vec<_>>(),
        reference.iter().map(|n| n.index).collect::<Vec<_>>(),
    );
    for (sq, eu) in hits.iter().zip(reference.iter()) {
        assert!(approx_eq!(f64, sq.distance, eu.distance * eu.distance, ulps = 4));
    }
}
