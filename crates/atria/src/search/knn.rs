//! Best-first k-nearest-neighbor search.

use std::cmp::Reverse;

use crate::neighbors::{Neighbor, NeighborTable};
use crate::tree::{Cluster, ClusterKind, Index};

use super::{is_excluded, SearchContext, SearchItem};

/// Finds the `k` nearest non-excluded neighbors of `query`.
///
/// Clusters are expanded best-first by their lower bound. Once the table is
/// full, a popped bound that cannot strictly improve the worst kept distance
/// ends the search: every pending bound is at least as large. Ties at the
/// worst distance are still examined so that equal-distance neighbors
/// resolve by ascending index.
pub(super) fn search(
    index: &Index,
    ctx: &mut SearchContext,
    query: &[f64],
    k: usize,
    exclude: Option<(usize, usize)>,
) -> Vec<Neighbor> {
    ctx.begin(k);

    let root = index.cluster(index.root_id());
    let d = index.query_distance(ctx, root.center, query);
    ctx.queue.push(Reverse(SearchItem::root(index.root_id(), d, root.rmax)));

    while let Some(Reverse(item)) = ctx.queue.pop() {
        if ctx.table.is_full() && item.d_min > ctx.table.worst_distance() {
            break;
        }
        ctx.note_cluster();
        let cluster = index.cluster(item.cluster);
        offer_visible(&mut ctx.table, exclude, cluster.center, item.dist);

        match cluster.kind {
            ClusterKind::Leaf => scan_leaf(index, ctx, query, cluster, item.dist, exclude),
            ClusterKind::Split { left, right, g_min } => {
                let l = index.cluster(left);
                let r = index.cluster(right);
                let d_l = index.query_distance(ctx, l.center, query);
                let d_r = index.query_distance(ctx, r.center, query);
                for child in [
                    item.child(left, l.rmax, d_l, d_r, g_min),
                    item.child(right, r.rmax, d_r, d_l, g_min),
                ] {
                    if !(ctx.table.is_full() && child.d_min > ctx.table.worst_distance()) {
                        ctx.queue.push(Reverse(child));
                    }
                }
            }
        }
    }

    ctx.table.drain_sorted()
}

/// Offers a point unless it is excluded.
fn offer_visible(table: &mut NeighborTable, exclude: Option<(usize, usize)>, point: usize, distance: f64) {
    if !is_excluded(exclude, point) {
        table.offer(Neighbor::new(point, distance));
    }
}

/// Scans a leaf's permutation span.
///
/// The stored distances are distances to the leaf's center, whose distance
/// to the query is `dist`; by the triangle inequality any point whose stored
/// distance differs from `dist` by more than the current worst cannot land
/// in the table, and is skipped without touching the metric. Surviving
/// points get an early-terminating metric call capped at the current worst.
fn scan_leaf(
    index: &Index,
    ctx: &mut SearchContext,
    query: &[f64],
    cluster: &Cluster,
    dist: f64,
    exclude: Option<(usize, usize)>,
) {
    for slot in cluster.span() {
        let entry = index.entry(slot);
        if is_excluded(exclude, entry.index) {
            continue;
        }
        let worst = ctx.table.worst_distance();
        if ctx.table.is_full() && (dist - entry.distance).abs() > worst {
            continue;
        }
        let d = index.query_distance_within(ctx, entry.index, query, worst);
        if d <= worst {
            ctx.table.offer(Neighbor::new(entry.index, d));
        }
    }
}
