//! The closed set of distance functions understood by the index.

use crate::error::Error;
use crate::points::{PointCoords, PointView};

/// Number of accumulation steps between threshold checks in the
/// early-terminating kernels. Checking on every element costs more in
/// branches than it saves in arithmetic on typical embedding dimensions.
const CHECK_EVERY: usize = 8;

/// A distance function over `R^D`.
///
/// Every variant exposes an exact distance and an early-terminating form
/// (see [`Metric::distance_within`]). The variants that satisfy the
/// triangle inequality may be used to build an
/// [`Index`](crate::Index); [`Metric::SquaredEuclidean`] does not, and is
/// accepted only by the linear-scan searches in [`crate::search::linear`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    /// `sqrt(sum_i (a_i - b_i)^2)`.
    Euclidean,
    /// `max_i |a_i - b_i|`, also called the Chebyshev distance.
    Maximum,
    /// `sum_i (a_i - b_i)^2`. Violates the triangle inequality.
    SquaredEuclidean,
    /// `sqrt(sum_i lambda^i (a_i - b_i)^2)` with `0 < lambda <= 1`, damping
    /// the later coordinates of each point.
    ExponentiallyWeightedEuclidean {
        /// Per-coordinate damping factor.
        lambda: f64,
    },
}

impl Metric {
    /// Creates an [`Metric::ExponentiallyWeightedEuclidean`] metric,
    /// validating the damping factor.
    ///
    /// # Errors
    ///
    /// If `lambda` is not in `(0, 1]`.
    pub fn exponentially_weighted(lambda: f64) -> Result<Self, Error> {
        if lambda > 0.0 && lambda <= 1.0 {
            Ok(Self::ExponentiallyWeightedEuclidean { lambda })
        } else {
            Err(Error::invalid(
                "lambda",
                format!("must be in (0, 1], got {lambda}"),
            ))
        }
    }

    /// Returns the name of the metric.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Maximum => "maximum",
            Self::SquaredEuclidean => "squared-euclidean",
            Self::ExponentiallyWeightedEuclidean { .. } => "exp-weighted-euclidean",
        }
    }

    /// Whether the metric satisfies the triangle inequality, and so may be
    /// used for cluster pruning.
    #[must_use]
    pub const fn obeys_triangle_inequality(&self) -> bool {
        !matches!(self, Self::SquaredEuclidean)
    }

    /// The exact distance between a stored point and a query slice.
    #[must_use]
    pub fn distance(&self, a: PointView<'_>, b: &[f64]) -> f64 {
        self.distance_within(a, b, f64::INFINITY)
    }

    /// Early-terminating distance.
    ///
    /// The result is exact whenever it is `<= tau`. Once the accumulated
    /// partial cost proves that the true distance exceeds `tau`, the kernel
    /// returns some value strictly greater than `tau` without finishing.
    #[must_use]
    pub fn distance_within(&self, a: PointView<'_>, b: &[f64], tau: f64) -> f64 {
        debug_assert_eq!(a.len(), b.len(), "point and query dimensions must agree");
        match *self {
            Self::Euclidean => squared_sum_within(a.coords(), b, tau * tau).sqrt(),
            Self::Maximum => max_abs_within(a.coords(), b, tau),
            Self::SquaredEuclidean => squared_sum_within(a.coords(), b, tau),
            Self::ExponentiallyWeightedEuclidean { lambda } => {
                weighted_squared_sum_within(a.coords(), b, lambda, tau * tau).sqrt()
            }
        }
    }
}

/// Accumulates `sum (a_i - b_i)^2`, giving up once the running sum exceeds
/// `cap`. The return value is exact whenever it is `<= cap`; when the sum is
/// abandoned early, the partial sum itself (already `> cap`) is returned.
fn squared_sum_within(a: PointCoords<'_>, b: &[f64], cap: f64) -> f64 {
    let mut acc = 0.0;
    let mut since_check = 0;
    for (x, &y) in a.zip(b) {
        let delta = x - y;
        acc += delta * delta;
        since_check += 1;
        if since_check == CHECK_EVERY {
            since_check = 0;
            if acc > cap {
                return acc;
            }
        }
    }
    acc
}

/// Like [`squared_sum_within`] with each term damped by `lambda^i`.
fn weighted_squared_sum_within(a: PointCoords<'_>, b: &[f64], lambda: f64, cap: f64) -> f64 {
    let mut acc = 0.0;
    let mut weight = 1.0;
    let mut since_check = 0;
    for (x, &y) in a.zip(b) {
        let delta = x - y;
        acc += weight * delta * delta;
        weight *= lambda;
        since_check += 1;
        if since_check == CHECK_EVERY {
            since_check = 0;
            if acc > cap {
                return acc;
            }
        }
    }
    acc
}

/// Running maximum of `|a_i - b_i|`, abandoned as soon as it exceeds `cap`.
/// The running maximum is a lower bound on the true distance, so the partial
/// value returned on early exit is itself strictly greater than `cap`.
fn max_abs_within(a: PointCoords<'_>, b: &[f64], cap: f64) -> f64 {
    let mut best = 0.0_f64;
    for (x, &y) in a.zip(b) {
        let delta = (x - y).abs();
        if delta > best {
            best = delta;
            if best > cap {
                return best;
            }
        }
    }
    best
}
