//! Carry group identity from one sampling radius down to the next

use crate::spatial::KdTree;
use crate::spheres::SphereSet;

/// Copy groups from spheres at `ref_radius` onto spheres at `target_radius`
///
/// Each target sphere takes the group of its nearest reference sphere when
/// that sphere lies within `ref_radius`; targets without such a neighbor keep
/// their group. Returns the number of target spheres relabeled.
pub fn propagate_between_radii(spheres: &mut SphereSet, ref_radius: f64, target_radius: f64) -> usize {
    let reference: Vec<usize> = spheres.indices_where(|s| s.radius == ref_radius);
    let targets: Vec<usize> = spheres.indices_where(|s| s.radius == target_radius);
    if reference.is_empty() || targets.is_empty() {
        return 0;
    }

    let ref_centers: Vec<[f64; 3]> = reference
        .iter()
        .map(|&i| spheres.spheres()[i].center)
        .collect();
    let tree = KdTree::build(&ref_centers);

    let assignments: Vec<(usize, _)> = targets
        .iter()
        .filter_map(|&t| {
            let center = spheres.spheres()[t].center;
            tree.nearest_within(center, ref_radius)
                .map(|(r, _)| (t, spheres.spheres()[reference[r]].group))
        })
        .collect();

    let rows = spheres.spheres_mut();
    for &(row, group) in &assignments {
        rows[row].group = group;
    }

    log::debug!(
        "Propagated groups from radius {} to {} spheres at radius {}",
        ref_radius,
        assignments.len(),
        target_radius
    );
    assignments.len()
}
