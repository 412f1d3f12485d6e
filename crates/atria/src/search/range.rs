//! Range search and range counting.

use std::cmp::Reverse;

use crate::neighbors::Neighbor;
use crate::tree::{ClusterKind, Index};

use super::{is_excluded, SearchContext, SearchItem};

/// Collects every non-excluded point within `radius` of `query`, ascending
/// by distance with ties broken by ascending index.
///
/// The traversal mirrors the k-NN search with a fixed threshold: a subtree
/// is pruned when its lower bound exceeds the radius, and leaf scans apply
/// the same stored-distance skip before calling the metric. Unlike the
/// counting search below, every hit needs its actual distance for the
/// output, so subtrees are always enumerated.
pub(super) fn search(
    index: &Index,
    ctx: &mut SearchContext,
    query: &[f64],
    radius: f64,
    exclude: Option<(usize, usize)>,
) -> Vec<Neighbor> {
    ctx.begin(0);
    let mut hits = Vec::new();

    let root = index.cluster(index.root_id());
    let d = index.query_distance(ctx, root.center, query);
    ctx.queue.push(Reverse(SearchItem::root(index.root_id(), d, root.rmax)));

    while let Some(Reverse(item)) = ctx.queue.pop() {
        if item.d_min > radius {
            continue;
        }
        ctx.note_cluster();
        let cluster = index.cluster(item.cluster);
        if item.dist <= radius && !is_excluded(exclude, cluster.center) {
            hits.push(Neighbor::new(cluster.center, item.dist));
        }

        match cluster.kind {
            ClusterKind::Leaf => {
                for slot in cluster.span() {
                    let entry = index.entry(slot);
                    if is_excluded(exclude, entry.index) {
                        continue;
                    }
                    if (item.dist - entry.distance).abs() > radius {
                        continue;
                    }
                    let d = index.query_distance_within(ctx, entry.index, query, radius);
                    if d <= radius {
                        hits.push(Neighbor::new(entry.index, d));
                    }
                }
            }
            ClusterKind::Split { left, right, g_min } => {
                let l = index.cluster(left);
                let r = index.cluster(right);
                let d_l = index.query_distance(ctx, l.center, query);
                let d_r = index.query_distance(ctx, r.center, query);
                for child in [
                    item.child(left, l.rmax, d_l, d_r, g_min),
                    item.child(right, r.rmax, d_r, d_l, g_min),
                ] {
                    if child.d_min <= radius {
                        ctx.queue.push(Reverse(child));
                    }
                }
            }
        }
    }

    hits.sort_unstable();
    hits
}

/// Counts the points within `radius` of `query` without materializing them.
///
/// Identical traversal to [`search`], plus one extra prune: a subtree whose
/// upper bound already lies within the radius contributes its full
/// cardinality without being descended. The shortcut is skipped while an
/// exclusion interval is active, since a blanket count cannot honor it.
pub(super) fn count(
    index: &Index,
    ctx: &mut SearchContext,
    query: &[f64],
    radius: f64,
    exclude: Option<(usize, usize)>,
) -> usize {
    ctx.begin(0);
    let mut count = 0_usize;

    let root = index.cluster(index.root_id());
    let d = index.query_distance(ctx, root.center, query);
    ctx.queue.push(Reverse(SearchItem::root(index.root_id(), d, root.rmax)));

    while let Some(Reverse(item)) = ctx.queue.pop() {
        if item.d_min > radius {
            continue;
        }
        ctx.note_cluster();
        let cluster = index.cluster(item.cluster);
        if exclude.is_none() && item.d_max <= radius {
            count += cluster.cardinality;
            continue;
        }
        if item.dist <= radius && !is_excluded(exclude, cluster.center) {
            count += 1;
        }

        match cluster.kind {
            ClusterKind::Leaf => {
                for slot in cluster.span() {
                    let entry = index.entry(slot);
                    if is_excluded(exclude, entry.index) {
                        continue;
                    }
                    if (item.dist - entry.distance).abs() > radius {
                        continue;
                    }
                    if index.query_distance_within(ctx, entry.index, query, radius) <= radius {
                        count += 1;
                    }
                }
            }
            ClusterKind::Split { left, right, g_min } => {
                let l = index.cluster(left);
                let r = index.cluster(right);
                let d_l = index.query_distance(ctx, l.center, query);
                let d_r = index.query_distance(ctx, r.center, query);
                for child in [
                    item.child(left, l.rmax, d_l, d_r, g_min),
                    item.child(right, r.rmax, d_r, d_l, g_min),
                ] {
                    if child.d_min <= radius {
                        ctx.queue.push(Reverse(child));
                    }
                }
            }
        }
    }

    count
}
