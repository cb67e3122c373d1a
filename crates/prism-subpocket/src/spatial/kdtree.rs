//! KD-tree for O(log n) sphere-center neighbor queries
//!
//! Median-split construction over 3D centers. Every query breaks distance
//! ties by the lowest input index so results do not depend on tree shape.

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug)]
struct IndexedPoint {
    coords: [f64; 3],
    idx: usize,
}

impl IndexedPoint {
    #[inline]
    fn distance_sq(&self, other: &[f64; 3]) -> f64 {
        let dx = self.coords[0] - other[0];
        let dy = self.coords[1] - other[1];
        let dz = self.coords[2] - other[2];
        dx * dx + dy * dy + dz * dz
    }
}

#[derive(Debug)]
struct KdNode {
    point: IndexedPoint,
    split_dim: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// 3D KD-tree over sphere centers
///
/// Construction: O(n log² n)
/// Range query: O(√n + k)
/// Nearest neighbor: O(log n) average
#[derive(Debug, Default)]
pub struct KdTree {
    root: Option<Box<KdNode>>,
    size: usize,
}

impl KdTree {
    /// Build a KD-tree; the index of each point is its position in `coords`.
    pub fn build(coords: &[[f64; 3]]) -> Self {
        let mut points: Vec<IndexedPoint> = coords
            .iter()
            .enumerate()
            .map(|(idx, &coords)| IndexedPoint { coords, idx })
            .collect();

        let size = points.len();
        let root = Self::build_recursive(&mut points, 0);

        KdTree { root, size }
    }

    fn build_recursive(points: &mut [IndexedPoint], depth: usize) -> Option<Box<KdNode>> {
        if points.is_empty() {
            return None;
        }

        let dim = depth % 3;
        points.sort_by(|a, b| {
            a.coords[dim]
                .partial_cmp(&b.coords[dim])
                .unwrap_or(Ordering::Equal)
                .then(a.idx.cmp(&b.idx))
        });

        let mid = points.len() / 2;
        let (left_slice, rest) = points.split_at_mut(mid);
        let (pivot, right_slice) = rest.split_first_mut()?;

        Some(Box::new(KdNode {
            point: *pivot,
            split_dim: dim,
            left: Self::build_recursive(left_slice, depth + 1),
            right: Self::build_recursive(right_slice, depth + 1),
        }))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// All points within `radius` (inclusive) of `query`
    ///
    /// Returns (index, distance) pairs sorted by distance, then index.
    pub fn radius_search(&self, query: [f64; 3], radius: f64) -> Vec<(usize, f64)> {
        let mut results = Vec::new();
        if radius < 0.0 {
            return results;
        }
        let radius_sq = radius * radius;

        if let Some(ref root) = self.root {
            Self::radius_search_recursive(root, &query, radius_sq, &mut results);
        }

        results.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results
    }

    fn radius_search_recursive(
        node: &KdNode,
        query: &[f64; 3],
        radius_sq: f64,
        results: &mut Vec<(usize, f64)>,
    ) {
        let dist_sq = node.point.distance_sq(query);
        if dist_sq <= radius_sq {
            results.push((node.point.idx, dist_sq.sqrt()));
        }

        let dim = node.split_dim;
        let diff = query[dim] - node.point.coords[dim];

        let (first, second) = if diff < 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(ref child) = first {
            Self::radius_search_recursive(child, query, radius_sq, results);
        }
        if diff * diff <= radius_sq {
            if let Some(ref child) = second {
                Self::radius_search_recursive(child, query, radius_sq, results);
            }
        }
    }

    /// Nearest point to `query` as (index, distance)
    pub fn nearest(&self, query: [f64; 3]) -> Option<(usize, f64)> {
        self.nearest_within(query, f64::INFINITY)
    }

    /// Nearest point no farther than `max_distance` (inclusive)
    pub fn nearest_within(&self, query: [f64; 3], max_distance: f64) -> Option<(usize, f64)> {
        let root = self.root.as_ref()?;
        if max_distance < 0.0 || max_distance.is_nan() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        let bound_sq = max_distance * max_distance;
        Self::nearest_recursive(root, &query, bound_sq, &mut best);
        best.map(|(idx, dist_sq)| (idx, dist_sq.sqrt()))
    }

    fn nearest_recursive(
        node: &KdNode,
        query: &[f64; 3],
        bound_sq: f64,
        best: &mut Option<(usize, f64)>,
    ) {
        let dist_sq = node.point.distance_sq(query);
        if dist_sq <= bound_sq {
            let better = match *best {
                None => true,
                Some((best_idx, best_sq)) => {
                    dist_sq < best_sq || (dist_sq == best_sq && node.point.idx < best_idx)
                }
            };
            if better {
                *best = Some((node.point.idx, dist_sq));
            }
        }

        let dim = node.split_dim;
        let diff = query[dim] - node.point.coords[dim];

        let (first, second) = if diff < 0.0 {
            (&node.left, &node.right)
        } else {
            (&node.right, &node.left)
        };

        if let Some(ref child) = first {
            Self::nearest_recursive(child, query, bound_sq, best);
        }

        // equal distances must still be visited for the index tie-break
        let limit_sq = best.map_or(bound_sq, |(_, best_sq)| best_sq);
        if diff * diff <= limit_sq {
            if let Some(ref child) = second {
                Self::nearest_recursive(child, query, bound_sq, best);
            }
        }
    }
}
