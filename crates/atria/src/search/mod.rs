//! Query algorithms over a built [`Index`].
//!
//! All three tree searches (k-NN, range, count-range) share the same
//! best-first traversal: clusters are expanded in order of a lower bound on
//! their distance to the query, subtrees whose bounds cannot beat the
//! current results are pruned, and leaf scans skip points using distances
//! precomputed at construction time before falling back to an
//! early-terminating metric call.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::ops::RangeInclusive;

use rayon::prelude::*;

use crate::error::Error;
use crate::neighbors::{Neighbor, NeighborTable};
use crate::points::QueryMatrix;
use crate::tree::{ClusterId, Index};

mod knn;
pub mod linear;
mod range;

/// A pending subtree with precomputed bounds on its distance to the query.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SearchItem {
    /// Arena id of the cluster.
    pub cluster: ClusterId,
    /// Exact distance from the query to the cluster's center.
    pub dist: f64,
    /// Lower bound on the distance from the query to any point in the
    /// subtree.
    pub d_min: f64,
    /// Upper bound on the distance from the query to any point in the
    /// subtree.
    pub d_max: f64,
}

impl SearchItem {
    /// Bounds for the root cluster, from the triangle inequality alone.
    pub(crate) fn root(cluster: ClusterId, dist: f64, rmax: f64) -> Self {
        Self {
            cluster,
            dist,
            d_min: (dist - rmax).max(0.0),
            d_max: dist + rmax,
        }
    }

    /// Bounds for a child cluster.
    ///
    /// The raw triangle-inequality interval is intersected with the parent's
    /// (a subtree can only shrink the reachable ball) and the lower bound is
    /// further tightened by the partition gap: every point in this child is
    /// closer to its own center than to the brother's by at least `g_min`,
    /// which yields `d(q, p) >= (dist - dist_brother + g_min) / 2`.
    pub(crate) fn child(&self, cluster: ClusterId, rmax: f64, dist: f64, dist_brother: f64, g_min: f64) -> Self {
        let d_min = (dist - rmax)
            .max(0.5 * (dist - dist_brother + g_min))
            .max(self.d_min)
            .max(0.0);
        Self {
            cluster,
            dist,
            d_min,
            d_max: (dist + rmax).min(self.d_max),
        }
    }
}

impl PartialEq for SearchItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchItem {}

impl PartialOrd for SearchItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.d_min
            .total_cmp(&other.d_min)
            .then_with(|| self.dist.total_cmp(&other.dist))
            .then_with(|| self.cluster.cmp(&other.cluster))
    }
}

/// Per-query instrumentation counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    /// Number of metric evaluations against the query, early-terminated
    /// calls included.
    pub distance_calcs: u64,
    /// Number of clusters expanded by the traversal.
    pub clusters_visited: u64,
}

impl SearchStats {
    /// The fraction of metric evaluations relative to a linear scan over
    /// `n` points. Well below one when pruning is effective.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn f_k(&self, n: usize) -> f64 {
        if n == 0 {
            0.0
        } else {
            self.distance_calcs as f64 / n as f64
        }
    }
}

/// Preallocated per-query scratch: the pending-cluster queue and the
/// best-`k` table.
///
/// A context may be reused across any number of queries against any index;
/// both buffers survive between queries, so a query loop allocates nothing
/// after its first few calls. A context must not be shared between threads
/// mid-query; give each worker its own.
#[derive(Debug, Default)]
pub struct SearchContext {
    /// Pending clusters, nearest lower bound first.
    pub(crate) queue: BinaryHeap<Reverse<SearchItem>>,
    /// The best-`k` table; unused by range searches.
    pub(crate) table: NeighborTable,
    /// Whether the instrumentation counters are maintained.
    stats_enabled: bool,
    /// Counters for the most recent query.
    stats: SearchStats,
}

impl SearchContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with buffers sized for `k_hint`-neighbor queries.
    #[must_use]
    pub fn with_capacity(k_hint: usize) -> Self {
        Self {
            queue: BinaryHeap::with_capacity(64),
            table: NeighborTable::new(k_hint),
            stats_enabled: false,
            stats: SearchStats::default(),
        }
    }

    /// Toggles the instrumentation counters. Off by default.
    pub fn track_stats(&mut self, enabled: bool) {
        self.stats_enabled = enabled;
    }

    /// Counters for the most recent query run through this context. All
    /// zero unless tracking was enabled.
    #[must_use]
    pub const fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Readies the context for a new query with table capacity `k`.
    pub(crate) fn begin(&mut self, k: usize) {
        self.queue.clear();
        self.table.reset(k);
        self.stats = SearchStats::default();
    }

    /// Counts one metric evaluation.
    pub(crate) fn count_distance(&mut self) {
        if self.stats_enabled {
            self.stats.distance_calcs += 1;
        }
    }

    /// Counts one expanded cluster.
    pub(crate) fn note_cluster(&mut self) {
        if self.stats_enabled {
            self.stats.clusters_visited += 1;
        }
    }
}

/// Whether `index` falls inside the closed exclusion interval.
pub(crate) fn is_excluded(exclude: Option<(usize, usize)>, index: usize) -> bool {
    exclude.is_some_and(|(first, last)| index >= first && index <= last)
}

impl Index {
    /// Exact distance from the query to point `index`, counted.
    pub(crate) fn query_distance(&self, ctx: &mut SearchContext, index: usize, query: &[f64]) -> f64 {
        ctx.count_distance();
        self.metric().distance(self.points().point(index), query)
    }

    /// Early-terminating distance from the query to point `index`, counted.
    pub(crate) fn query_distance_within(&self, ctx: &mut SearchContext, index: usize, query: &[f64], tau: f64) -> f64 {
        ctx.count_distance();
        self.metric().distance_within(self.points().point(index), query, tau)
    }

    /// Rejects queries whose length does not match the indexed dimension.
    fn check_query(&self, query: &[f64]) -> Result<(), Error> {
        if query.len() == self.dim() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.dim(),
                actual: query.len(),
            })
        }
    }

    /// Rejects `k < 1`.
    fn check_k(k: usize) -> Result<(), Error> {
        if k < 1 {
            Err(Error::invalid("k", "must be at least 1"))
        } else {
            Ok(())
        }
    }

    /// Rejects negative (or undefined) radii.
    fn check_radius(radius: f64) -> Result<(), Error> {
        if radius >= 0.0 {
            Ok(())
        } else {
            Err(Error::invalid("radius", format!("must be non-negative, got {radius}")))
        }
    }

    /// The `k` nearest neighbors of `query`, ascending by distance with ties
    /// broken by ascending index. Returns fewer than `k` neighbors only when
    /// the index holds fewer than `k` points.
    ///
    /// Allocates a fresh [`SearchContext`]; query loops should hold one and
    /// call [`Index::knn_with`] instead.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `k < 1`.
    /// - [`Error::DimensionMismatch`] if `query.len()` is not the indexed
    ///   dimension.
    pub fn knn(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>, Error> {
        self.knn_with(&mut SearchContext::new(), query, k)
    }

    /// [`Index::knn`] with a caller-owned context.
    ///
    /// # Errors
    ///
    /// As for [`Index::knn`].
    pub fn knn_with(&self, ctx: &mut SearchContext, query: &[f64], k: usize) -> Result<Vec<Neighbor>, Error> {
        Self::check_k(k)?;
        self.check_query(query)?;
        Ok(knn::search(self, ctx, query, k, None))
    }

    /// [`Index::knn_with`] with every point index in the closed interval
    /// `exclude` made invisible to the query. Used to suppress the query
    /// point itself, or a temporal window around it, when the query is drawn
    /// from the indexed set.
    ///
    /// # Errors
    ///
    /// As for [`Index::knn`].
    pub fn knn_excluding(
        &self,
        ctx: &mut SearchContext,
        query: &[f64],
        k: usize,
        exclude: RangeInclusive<usize>,
    ) -> Result<Vec<Neighbor>, Error> {
        Self::check_k(k)?;
        self.check_query(query)?;
        Ok(knn::search(self, ctx, query, k, Some((*exclude.start(), *exclude.end()))))
    }

    /// Every point within `radius` of `query`, ascending by distance with
    /// ties broken by ascending index.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `radius` is negative.
    /// - [`Error::DimensionMismatch`] if `query.len()` is not the indexed
    ///   dimension.
    pub fn range(&self, query: &[f64], radius: f64) -> Result<Vec<Neighbor>, Error> {
        self.range_with(&mut SearchContext::new(), query, radius)
    }

    /// [`Index::range`] with a caller-owned context.
    ///
    /// # Errors
    ///
    /// As for [`Index::range`].
    pub fn range_with(&self, ctx: &mut SearchContext, query: &[f64], radius: f64) -> Result<Vec<Neighbor>, Error> {
        Self::check_radius(radius)?;
        self.check_query(query)?;
        Ok(range::search(self, ctx, query, radius, None))
    }

    /// [`Index::range_with`] with an exclusion interval, as in
    /// [`Index::knn_excluding`].
    ///
    /// # Errors
    ///
    /// As for [`Index::range`].
    pub fn range_excluding(
        &self,
        ctx: &mut SearchContext,
        query: &[f64],
        radius: f64,
        exclude: RangeInclusive<usize>,
    ) -> Result<Vec<Neighbor>, Error> {
        Self::check_radius(radius)?;
        self.check_query(query)?;
        Ok(range::search(self, ctx, query, radius, Some((*exclude.start(), *exclude.end()))))
    }

    /// The number of points within `radius` of `query`. Agrees with
    /// `self.range(query, radius)?.len()` while never materializing the
    /// hits, and additionally claims whole subtrees whose upper bound lies
    /// within the radius without descending into them.
    ///
    /// # Errors
    ///
    /// As for [`Index::range`].
    pub fn count_range(&self, query: &[f64], radius: f64) -> Result<usize, Error> {
        self.count_range_with(&mut SearchContext::new(), query, radius)
    }

    /// [`Index::count_range`] with a caller-owned context.
    ///
    /// # Errors
    ///
    /// As for [`Index::range`].
    pub fn count_range_with(&self, ctx: &mut SearchContext, query: &[f64], radius: f64) -> Result<usize, Error> {
        Self::check_radius(radius)?;
        self.check_query(query)?;
        Ok(range::count(self, ctx, query, radius, None))
    }

    /// [`Index::count_range_with`] with an exclusion interval, as in
    /// [`Index::knn_excluding`].
    ///
    /// # Errors
    ///
    /// As for [`Index::range`].
    pub fn count_range_excluding(
        &self,
        ctx: &mut SearchContext,
        query: &[f64],
        radius: f64,
        exclude: RangeInclusive<usize>,
    ) -> Result<usize, Error> {
        Self::check_radius(radius)?;
        self.check_query(query)?;
        Ok(range::count(self, ctx, query, radius, Some((*exclude.start(), *exclude.end()))))
    }

    /// k-NN for every column of `queries`, serially, reusing one context.
    /// Results are in query order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `k < 1`.
    /// - [`Error::DimensionMismatch`] if the queries' dimension is not the
    ///   indexed dimension.
    pub fn batch_knn(&self, queries: &QueryMatrix<'_>, k: usize) -> Result<Vec<Vec<Neighbor>>, Error> {
        let mut ctx = SearchContext::new();
        queries.columns().map(|q| self.knn_with(&mut ctx, q, k)).collect()
    }

    /// [`Index::batch_knn`] parallelized across queries with one context per
    /// worker. Results are in query order regardless of worker assignment.
    ///
    /// # Errors
    ///
    /// As for [`Index::batch_knn`].
    pub fn par_batch_knn(&self, queries: &QueryMatrix<'_>, k: usize) -> Result<Vec<Vec<Neighbor>>, Error> {
        (0..queries.len())
            .into_par_iter()
            .map_init(SearchContext::new, |ctx, j| self.knn_with(ctx, queries.column(j), k))
            .collect()
    }
}
