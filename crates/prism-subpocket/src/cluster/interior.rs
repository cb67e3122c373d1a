//! Removal of spheres swallowed by larger ones or near a reference cloud

use std::collections::BTreeSet;

use crate::spatial::KdTree;
use crate::spheres::SphereSet;

/// Delete every sphere lying entirely inside another sphere of the set
///
/// A neighbour is interior to a query sphere when
/// `r_query - r_neighbour - distance > 0`. Group membership is ignored.
/// Every sphere is tested against the untouched input, so a second pass
/// finds nothing new. Returns the number of rows removed.
pub fn remove_interior(spheres: &mut SphereSet) -> usize {
    let (Some(min_radius), Some(max_radius)) = (spheres.min_radius(), spheres.max_radius()) else {
        return 0;
    };

    let tree = KdTree::build(&spheres.xyz());
    let mut interior = BTreeSet::new();
    for query in spheres.iter() {
        for (index, dist) in tree.radius_search(query.center, max_radius - min_radius) {
            let neighbour = &spheres.spheres()[index];
            if query.radius - neighbour.radius - dist > 0.0 {
                interior.insert(index);
            }
        }
    }

    if interior.is_empty() {
        return 0;
    }
    let mut row = 0;
    let removed = spheres.retain(|_| {
        let keep = !interior.contains(&row);
        row += 1;
        keep
    });
    log::debug!("Removed {} interior spheres from {}", removed, spheres.label());
    removed
}

/// Delete every sphere whose center lies within `radius` of a center in
/// `reference`; returns the number of rows removed
pub fn remove_included_spheres(spheres: &mut SphereSet, reference: &SphereSet, radius: f64) -> usize {
    if spheres.is_empty() || reference.is_empty() {
        return 0;
    }

    let tree = KdTree::build(&spheres.xyz());
    let mut included = BTreeSet::new();
    for sphere in reference.iter() {
        included.extend(tree.radius_search(sphere.center, radius).into_iter().map(|(i, _)| i));
    }

    let mut row = 0;
    let removed = spheres.retain(|_| {
        let keep = !included.contains(&row);
        row += 1;
        keep
    });
    log::debug!("Removed {} spheres within {} A of reference", removed, radius);
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swallowed_sphere_is_removed() {
        let mut set = SphereSet::from_xyzrg(&[
            [0.0, 0.0, 0.0, 2.0, 1.0],
            [1.0, 0.0, 0.0, 0.5, 2.0],
        ])
        .unwrap();
        assert_eq!(remove_interior(&mut set), 1);
        assert_eq!(set.xyzrg(), vec![[0.0, 0.0, 0.0, 2.0, 1.0]]);
    }

    #[test]
    fn tangent_sphere_is_kept() {
        // 2.0 - 0.5 - 1.5 == 0, not strictly inside
        let mut set = SphereSet::from_xyzr(&[[0.0, 0.0, 0.0, 2.0], [1.5, 0.0, 0.0, 0.5]], None).unwrap();
        assert_eq!(remove_interior(&mut set), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn nested_chain_is_removed_in_one_pass() {
        let mut set = SphereSet::from_xyzr(
            &[
                [0.0, 0.0, 0.0, 3.0],
                [0.5, 0.0, 0.0, 2.0],
                [0.6, 0.0, 0.0, 1.0],
                [9.0, 0.0, 0.0, 1.0],
            ],
            None,
        )
        .unwrap();
        assert_eq!(remove_interior(&mut set), 2);
        let once = set.xyzrg();
        assert_eq!(remove_interior(&mut set), 0);
        assert_eq!(set.xyzrg(), once);
    }

    #[test]
    fn empty_set_is_a_no_op() {
        let mut set = SphereSet::empty();
        assert_eq!(remove_interior(&mut set), 0);
    }

    #[test]
    fn included_spheres_near_reference_are_removed() {
        let mut set = SphereSet::from_xyz(&[[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [6.0, 0.0, 0.0]], Some(1.0)).unwrap();
        let reference = SphereSet::from_xyz(&[[0.5, 0.0, 0.0]], Some(1.0)).unwrap();
        assert_eq!(remove_included_spheres(&mut set, &reference, 1.5), 2);
        assert_eq!(set.xyz(), vec![[6.0, 0.0, 0.0]]);
    }
}
