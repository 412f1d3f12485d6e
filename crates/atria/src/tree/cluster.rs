//! Nodes of the binary cluster tree.

use std::ops::Range;

/// Identifier of a cluster in the arena.
///
/// Children are referenced through these 32-bit ids rather than boxed
/// pointers, keeping the arena flat and traversal cache-friendly.
pub(crate) type ClusterId = u32;

/// A node of the binary cluster tree.
///
/// Every node describes a slice `offset .. offset + cardinality` of the
/// permutation table: the node's center occupies slot `offset`, and the
/// points it owns occupy the rest. For a leaf those slots are scanned
/// directly at query time; for a split node they are covered by the two
/// children, whose own centers again sit at the front of their slices.
#[derive(Debug, Clone)]
pub(crate) struct Cluster {
    /// Index of the center point in the point set.
    pub center: usize,
    /// Maximum distance from the center to any point the node owns. Zero
    /// for a singleton.
    pub rmax: f64,
    /// First permutation slot of the node's slice (the center's slot).
    pub offset: usize,
    /// Number of points in the subtree, center included.
    pub cardinality: usize,
    /// Leaf or split.
    pub kind: ClusterKind,
}

/// The terminal or partitioned state of a [`Cluster`].
#[derive(Debug, Clone)]
pub(crate) enum ClusterKind {
    /// Terminal node: points are scanned from the permutation slice, whose
    /// stored distances are distances to this node's center.
    Leaf,
    /// Partitioned node.
    Split {
        /// Arena id of the child around the first pole.
        left: ClusterId,
        /// Arena id of the child around the second pole.
        right: ClusterId,
        /// Partition margin: every point assigned to one child is closer to
        /// its own center than to the brother's by at least this much.
        g_min: f64,
    },
}

impl Cluster {
    /// Whether the node is terminal.
    pub const fn is_leaf(&self) -> bool {
        matches!(self.kind, ClusterKind::Leaf)
    }

    /// The permutation slots owned by this node, excluding the center's own
    /// slot.
    pub const fn span(&self) -> Range<usize> {
        (self.offset + 1)..(self.offset + self.cardinality)
    }
}
