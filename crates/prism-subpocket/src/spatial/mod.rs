//! Spatial indexing over sphere centers

pub mod kdtree;

pub use kdtree::KdTree;

/// Euclidean distance between two points
#[inline]
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Connected components of the `distance <= eps` graph.
///
/// Labels start at 0 and are assigned in order of each component's first
/// member, so the result only depends on point order.
pub fn connected_components(points: &[[f64; 3]], eps: f64) -> Vec<usize> {
    let tree = KdTree::build(points);
    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut next_label = 0;
    let mut stack = Vec::new();

    for seed in 0..points.len() {
        if labels[seed].is_some() {
            continue;
        }
        labels[seed] = Some(next_label);
        stack.push(seed);

        while let Some(current) = stack.pop() {
            for (neighbor, _) in tree.radius_search(points[current], eps) {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(next_label);
                    stack.push(neighbor);
                }
            }
        }
        next_label += 1;
    }

    labels.into_iter().map(|l| l.unwrap_or(0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_follow_first_appearance() {
        let points = [
            [10.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [10.5, 0.0, 0.0],
            [0.9, 0.0, 0.0],
            [50.0, 0.0, 0.0],
        ];
        let labels = connected_components(&points, 1.0);
        assert_eq!(labels, vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn chained_points_share_a_component() {
        let points: Vec<[f64; 3]> = (0..10).map(|i| [i as f64 * 0.9, 0.0, 0.0]).collect();
        let labels = connected_components(&points, 1.0);
        assert!(labels.iter().all(|&l| l == 0));
    }
}
