//! Tree construction by recursive farthest-pair partitioning.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::metric::Metric;
use crate::neighbors::Neighbor;
use crate::points::PointSet;

use super::cluster::{Cluster, ClusterId, ClusterKind};
use super::BuildParams;

/// Scratch state for one construction run.
///
/// The permutation table is reordered in place as clusters are split; the
/// stored distance of every slot is kept equal to the distance from that
/// point to the center of the cluster currently owning the slot, so a node
/// that ends up terminal needs no further distance work.
pub(crate) struct Builder<'a> {
    /// The points being indexed.
    points: &'a PointSet,
    /// The metric the tree is built under.
    metric: Metric,
    /// Target leaf size.
    min_points: usize,
    /// Seeded generator for the farthest-pair seed draws.
    rng: StdRng,
    /// The permutation table under construction.
    permutation: Vec<Neighbor>,
    /// The cluster arena under construction.
    arena: Vec<Cluster>,
    /// Materialized coordinates of the point distances are measured against.
    center_buf: Vec<f64>,
    /// Distances to the first pole, computed while selecting the second pole
    /// and reused by the partition pass.
    pole_dists: Vec<f64>,
    /// Points assigned to the first pole in the current split.
    left_buf: Vec<Neighbor>,
    /// Points assigned to the second pole in the current split.
    right_buf: Vec<Neighbor>,
}

/// Builds the cluster arena and permutation table for `points`.
///
/// The caller has already validated `params` and rejected inadmissible
/// metrics and empty point sets.
pub(crate) fn build(points: &PointSet, metric: Metric, params: &BuildParams) -> (Vec<Cluster>, Vec<Neighbor>) {
    let n = points.len();
    let mut builder = Builder {
        points,
        metric,
        min_points: params.min_points,
        rng: StdRng::seed_from_u64(params.seed),
        permutation: (0..n).map(|i| Neighbor::new(i, 0.0)).collect(),
        arena: Vec::with_capacity(1 + 2 * n / params.min_points.max(1)),
        center_buf: vec![0.0; points.dim()],
        pole_dists: Vec::new(),
        left_buf: Vec::new(),
        right_buf: Vec::new(),
    };
    builder.build_root();
    (builder.arena, builder.permutation)
}

impl Builder<'_> {
    /// Copies point `index` into the scratch buffer distances are measured
    /// against.
    fn materialize(&mut self, index: usize) {
        self.points.copy_point_into(index, &mut self.center_buf);
    }

    /// Exact distance from the point in permutation slot `slot` to the
    /// materialized center.
    fn slot_distance(&self, slot: usize) -> f64 {
        self.metric
            .distance(self.points.point(self.permutation[slot].index), &self.center_buf)
    }

    /// Appends a cluster to the arena and returns its id.
    fn push(&mut self, cluster: Cluster) -> ClusterId {
        let id = ClusterId::try_from(self.arena.len())
            .unwrap_or_else(|_| unreachable!("the arena holds fewer clusters than points"));
        self.arena.push(cluster);
        id
    }

    /// Selects the root center, fills the table with distances to it, and
    /// recurses.
    fn build_root(&mut self) {
        let n = self.permutation.len();
        ftlog::debug!("Building a cluster tree over {n} points of dimension {}", self.points.dim());

        // Root center: the point farthest from a randomly drawn seed.
        let seed_slot = self.rng.gen_range(0..n);
        self.materialize(self.permutation[seed_slot].index);
        let mut center_slot = 0;
        let mut best = f64::NEG_INFINITY;
        for slot in 0..n {
            let d = self.slot_distance(slot);
            if d > best {
                best = d;
                center_slot = slot;
            }
        }
        self.permutation.swap(0, center_slot);

        let center = self.permutation[0].index;
        self.materialize(center);
        let mut rmax = 0.0;
        for slot in 1..n {
            let d = self.slot_distance(slot);
            self.permutation[slot].distance = d;
            if d > rmax {
                rmax = d;
            }
        }
        self.permutation[0].distance = 0.0;

        let root = Cluster {
            center,
            rmax,
            offset: 0,
            cardinality: n,
            kind: ClusterKind::Leaf,
        };
        let root_id = self.push(root);
        self.partition(root_id);
        ftlog::debug!("Built {} clusters over {n} points", self.arena.len());
    }

    /// Splits the cluster `id` if it is large enough and the split makes
    /// progress, then recurses into the children.
    ///
    /// On entry, every slot in the node's span stores the distance to the
    /// node's center; this holds for the children's spans on exit.
    fn partition(&mut self, id: ClusterId) {
        let (offset, cardinality) = {
            let cluster = &self.arena[id as usize];
            (cluster.offset, cluster.cardinality)
        };
        if cardinality <= self.min_points {
            return;
        }
        let lo = offset + 1;
        let hi = offset + cardinality - 1;
        if hi <= lo {
            // Zero or one point besides the center; nothing to split.
            return;
        }

        // First pole: the point farthest from a randomly drawn seed.
        let seed_slot = self.rng.gen_range(lo..=hi);
        self.materialize(self.permutation[seed_slot].index);
        let mut pole_slot = lo;
        let mut best = f64::NEG_INFINITY;
        for slot in lo..=hi {
            let d = self.slot_distance(slot);
            if d > best {
                best = d;
                pole_slot = slot;
            }
        }
        self.permutation.swap(lo, pole_slot);
        let left_center = self.permutation[lo].index;

        // Second pole: the point farthest from the first. The distances from
        // this pass double as the first-pole distances of the partition
        // below, so the partition itself only pays for the second pole's.
        self.materialize(left_center);
        self.pole_dists.clear();
        let mut far_entry = 0;
        let mut d_centers = f64::NEG_INFINITY;
        for slot in (lo + 1)..=hi {
            let d = self.slot_distance(slot);
            if d > d_centers {
                d_centers = d;
                far_entry = self.pole_dists.len();
            }
            self.pole_dists.push(d);
        }
        if d_centers <= 0.0 {
            // Every candidate pair coincides; the span is degenerate.
            ftlog::debug!("Degenerate span of {} points; node stays terminal", cardinality - 1);
            return;
        }
        let last_entry = self.pole_dists.len() - 1;
        self.permutation.swap(lo + 1 + far_entry, hi);
        self.pole_dists.swap(far_entry, last_entry);
        let right_center = self.permutation[hi].index;

        // Assign every remaining point to its nearer pole, ties to the
        // first. The margin by which the winning side won, minimized over
        // the span (and capped by the pole distance itself), is the
        // partition gap used to tighten child bounds during search.
        self.materialize(right_center);
        self.left_buf.clear();
        self.right_buf.clear();
        let mut g_min = d_centers;
        for (entry, slot) in ((lo + 1)..hi).enumerate() {
            let d_left = self.pole_dists[entry];
            let d_right = self.slot_distance(slot);
            let index = self.permutation[slot].index;
            let margin = if d_left <= d_right {
                self.left_buf.push(Neighbor::new(index, d_left));
                d_right - d_left
            } else {
                self.right_buf.push(Neighbor::new(index, d_right));
                d_left - d_right
            };
            if margin < g_min {
                g_min = margin;
            }
        }
        if self.left_buf.is_empty() || self.right_buf.is_empty() {
            ftlog::debug!(
                "One-sided partition of {} points ({} left, {} right); node stays terminal",
                cardinality - 1,
                self.left_buf.len() + 1,
                self.right_buf.len() + 1,
            );
            return;
        }

        // Lay the slice back out as: first pole, its points, second pole,
        // its points. Pole slots are excluded from the child spans and keep
        // a zero stored distance.
        let nl = self.left_buf.len();
        let nr = self.right_buf.len();
        let mut rmax_left = 0.0;
        for (entry, neighbor) in self.left_buf.iter().enumerate() {
            self.permutation[lo + 1 + entry] = *neighbor;
            if neighbor.distance > rmax_left {
                rmax_left = neighbor.distance;
            }
        }
        self.permutation[lo].distance = 0.0;
        self.permutation[lo + nl + 1] = Neighbor::new(right_center, 0.0);
        let mut rmax_right = 0.0;
        for (entry, neighbor) in self.right_buf.iter().enumerate() {
            self.permutation[lo + nl + 2 + entry] = *neighbor;
            if neighbor.distance > rmax_right {
                rmax_right = neighbor.distance;
            }
        }

        let left = Cluster {
            center: left_center,
            rmax: rmax_left,
            offset: lo,
            cardinality: nl + 1,
            kind: ClusterKind::Leaf,
        };
        let right = Cluster {
            center: right_center,
            rmax: rmax_right,
            offset: lo + nl + 1,
            cardinality: nr + 1,
            kind: ClusterKind::Leaf,
        };
        let left_id = self.push(left);
        let right_id = self.push(right);
        self.arena[id as usize].kind = ClusterKind::Split {
            left: left_id,
            right: right_id,
            g_min,
        };

        self.partition(left_id);
        self.partition(right_id);
    }
}
