//! Triangle-inequality accelerated nearest-neighbor search.
//!
//! This crate indexes a fixed set of points in `R^D` under a chosen metric
//! and answers three kinds of query: the `k` nearest neighbors, all points
//! within a radius, and the count of points within a radius. The index is a
//! binary tree of clusters, each carrying a center point and covering
//! radius; searches expand clusters best-first and use the triangle
//! inequality to discard whole subtrees, and most remaining points, without
//! evaluating the metric.
//!
//! The design targets data whose intrinsic dimension is much lower than its
//! ambient dimension, as produced by delay embeddings of chaotic time
//! series; on such data the fraction of metric evaluations per query drops
//! orders of magnitude below a linear scan. Both a dense dimension-major
//! matrix and an unmaterialized delay embedding are supported as point
//! storage.
//!
//! ## Modules and types
//!
//! - [`PointSet`], [`Metric`]: the data and the distance, shared immutably
//!   with the index.
//! - [`Index`], [`BuildParams`]: construction by seeded farthest-pair
//!   partitioning.
//! - [`search`]: the query algorithms, with [`SearchContext`] as the
//!   reusable per-query scratch and [`search::linear`] as the exhaustive
//!   reference.
//!
//! ```
//! use std::sync::Arc;
//! use atria::{BuildParams, Metric, PointSet, Index};
//!
//! // Four corners of the unit square, one contiguous column per point.
//! let data = vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0];
//! let points = Arc::new(PointSet::dense(data, 2)?);
//! let index = Index::build(points, Metric::Euclidean, &BuildParams::default())?;
//!
//! let hits = index.knn(&[0.1, 0.1], 2)?;
//! assert_eq!(hits[0].index, 0);
//! # Ok::<(), atria::Error>(())
//! ```

mod error;
mod metric;
mod neighbors;
mod points;
pub mod search;
mod tree;

pub use error::Error;
pub use metric::Metric;
pub use neighbors::{Neighbor, NeighborTable};
pub use points::{PointSet, PointView, QueryMatrix};
pub use search::{SearchContext, SearchStats};
pub use tree::{BuildParams, Index, TreeSummary};
