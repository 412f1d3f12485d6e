//! Linear-scan reference searches.
//!
//! These iterate every point, so they accept any [`Metric`], including
//! [`Metric::SquaredEuclidean`], which the tree rejects. They double as the
//! oracle the indexed searches are cross-validated against.

use crate::error::Error;
use crate::metric::Metric;
use crate::neighbors::{Neighbor, NeighborTable};
use crate::points::PointSet;

/// Rejects negative (or undefined) radii.
fn check_radius(radius: f64) -> Result<(), Error> {
    if radius >= 0.0 {
        Ok(())
    } else {
        Err(Error::invalid("radius", format!("must be non-negative, got {radius}")))
    }
}

/// Rejects queries whose length does not match the point dimension.
fn check_query(points: &PointSet, query: &[f64]) -> Result<(), Error> {
    if query.len() == points.dim() {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            expected: points.dim(),
            actual: query.len(),
        })
    }
}

/// The `k` nearest neighbors of `query` by exhaustive scan, ascending by
/// distance with ties broken by ascending index.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] if `k < 1`.
/// - [`Error::DimensionMismatch`] if `query.len()` is not the point
///   dimension.
pub fn knn(points: &PointSet, metric: Metric, query: &[f64], k: usize) -> Result<Vec<Neighbor>, Error> {
    if k < 1 {
        return Err(Error::invalid("k", "must be at least 1"));
    }
    check_query(points, query)?;

    let mut table = NeighborTable::new(k);
    for i in 0..points.len() {
        table.offer(Neighbor::new(i, metric.distance(points.point(i), query)));
    }
    Ok(table.drain_sorted())
}

/// Every point within `radius` of `query` by exhaustive scan, ascending by
/// distance with ties broken by ascending index.
///
/// # Errors
///
/// - [`Error::InvalidParameter`] if `radius` is negative.
/// - [`Error::DimensionMismatch`] if `query.len()` is not the point
///   dimension.
pub fn range(points: &PointSet, metric: Metric, query: &[f64], radius: f64) -> Result<Vec<Neighbor>, Error> {
    check_radius(radius)?;
    check_query(points, query)?;

    let mut hits = (0..points.len())
        .filter_map(|i| {
            let d = metric.distance(points.point(i), query);
            (d <= radius).then_some(Neighbor::new(i, d))
        })
        .collect::<Vec<_>>();
    hits.sort_unstable();
    Ok(hits)
}

/// The number of points within `radius` of `query` by exhaustive scan.
///
/// # Errors
///
/// As for [`range`].
pub fn count_range(points: &PointSet, metric: Metric, query: &[f64], radius: f64) -> Result<usize, Error> {
    check_radius(radius)?;
    check_query(points, query)?;

    Ok((0..points.len())
        .filter(|&i| metric.distance(points.point(i), query) <= radius)
        .count())
}
