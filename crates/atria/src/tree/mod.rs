//! The immutable index: a cluster arena over a permutation of the points.

use std::sync::Arc;

use crate::error::Error;
use crate::metric::Metric;
use crate::neighbors::Neighbor;
use crate::points::PointSet;

mod build;
mod cluster;

pub(crate) use cluster::{Cluster, ClusterId, ClusterKind};

/// Construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildParams {
    /// Target leaf size: a cluster holding this many points or fewer is not
    /// split further.
    pub min_points: usize,
    /// Seed for the farthest-pair seed draws. The same seed and inputs
    /// produce an identical tree and identical query results.
    pub seed: u64,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self { min_points: 64, seed: 42 }
    }
}

impl BuildParams {
    /// Creates parameters with the given leaf size and the default seed.
    #[must_use]
    pub fn new(min_points: usize) -> Self {
        Self {
            min_points,
            ..Self::default()
        }
    }

    /// Replaces the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A nearest-neighbor index over an immutable point set.
///
/// The index is a binary tree of clusters, each holding a center point and
/// the radius of the ball that covers its subtree. Leaves are contiguous
/// spans of a permutation table whose entries remember their distance to the
/// owning leaf's center, which lets query-time scans skip most points by the
/// triangle inequality alone.
///
/// Built once, then queried any number of times; the point set is shared
/// with the caller and the tree itself is never mutated.
#[derive(Debug)]
pub struct Index {
    /// The indexed points, shared with the caller.
    points: Arc<PointSet>,
    /// The metric the tree was built under.
    metric: Metric,
    /// All clusters, root first.
    arena: Vec<Cluster>,
    /// The permutation table; leaf spans index into it.
    permutation: Vec<Neighbor>,
    /// The leaf-size parameter the tree was built with.
    min_points: usize,
}

impl Index {
    /// Builds an index over `points` under `metric`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `params.min_points < 1`, or if the
    ///   metric does not satisfy the triangle inequality (such a metric
    ///   would make the pruning bounds unsound; use the linear searches in
    ///   [`crate::search::linear`] instead).
    pub fn build(points: Arc<PointSet>, metric: Metric, params: &BuildParams) -> Result<Self, Error> {
        if params.min_points < 1 {
            return Err(Error::invalid("min_points", "must be at least 1"));
        }
        if !metric.obeys_triangle_inequality() {
            return Err(Error::invalid(
                "metric",
                format!("{} violates the triangle inequality and cannot drive cluster pruning", metric.name()),
            ));
        }
        let (arena, permutation) = build::build(points.as_ref(), metric, params);
        Ok(Self {
            points,
            metric,
            arena,
            permutation,
            min_points: params.min_points,
        })
    }

    /// The indexed points.
    #[must_use]
    pub fn points(&self) -> &PointSet {
        self.points.as_ref()
    }

    /// The metric the tree was built under.
    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    /// The number of indexed points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.permutation.len()
    }

    /// Whether the index holds no points. Construction rejects empty point
    /// sets, so this is `false` for any built index.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.permutation.is_empty()
    }

    /// The dimension of the indexed points.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.points.dim()
    }

    /// The leaf-size parameter the tree was built with.
    #[must_use]
    pub const fn min_points(&self) -> usize {
        self.min_points
    }

    /// The permutation table. Every point index appears exactly once; the
    /// stored distances are distances to owning-cluster centers.
    #[must_use]
    pub fn permutation(&self) -> &[Neighbor] {
        &self.permutation
    }

    /// Shape diagnostics for the built tree.
    #[must_use]
    pub fn summary(&self) -> TreeSummary {
        let mut summary = TreeSummary {
            clusters: self.arena.len(),
            leaves: 0,
            max_depth: 0,
            mean_leaf_cardinality: 0.0,
        };
        let mut stack = vec![(self.root_id(), 0_usize)];
        let mut leaf_points = 0_usize;
        while let Some((id, depth)) = stack.pop() {
            let cluster = self.cluster(id);
            summary.max_depth = summary.max_depth.max(depth);
            match cluster.kind {
                ClusterKind::Leaf => {
                    summary.leaves += 1;
                    leaf_points += cluster.cardinality;
                }
                ClusterKind::Split { left, right, .. } => {
                    stack.push((left, depth + 1));
                    stack.push((right, depth + 1));
                }
            }
        }
        if summary.leaves > 0 {
            #[allow(clippy::cast_precision_loss)]
            {
                summary.mean_leaf_cardinality = leaf_points as f64 / summary.leaves as f64;
            }
        }
        summary
    }

    /// The arena id of the root cluster.
    pub(crate) const fn root_id(&self) -> ClusterId {
        0
    }

    /// The cluster with arena id `id`.
    pub(crate) fn cluster(&self, id: ClusterId) -> &Cluster {
        &self.arena[id as usize]
    }

    /// Entry `slot` of the permutation table.
    pub(crate) fn entry(&self, slot: usize) -> Neighbor {
        self.permutation[slot]
    }
}

/// Shape diagnostics reported by [`Index::summary`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeSummary {
    /// Total number of clusters in the arena.
    pub clusters: usize,
    /// Number of terminal clusters.
    pub leaves: usize,
    /// Depth of the deepest cluster, root at zero.
    pub max_depth: usize,
    /// Mean number of points per terminal cluster, centers included.
    pub mean_leaf_cardinality: f64,
}
