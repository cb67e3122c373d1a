//! Density clustering of spheres that share one radius

use crate::errors::{Result, SubpocketError};
use crate::spatial;
use crate::spheres::{Group, SphereSet};

/// Cluster the ungrouped spheres of radius `radius`, modifying groups in place
///
/// Density clustering with neighborhood `radius` and a minimum cluster size
/// of one, i.e. connected components of the `distance <= radius` graph;
/// isolated spheres become singleton clusters. With `allow_new` the clusters
/// get fresh resolved ids above every resolved id in the set; otherwise they
/// get fresh pending ids. Returns the number of clusters formed.
pub fn cluster_within_radius(spheres: &mut SphereSet, radius: f64, allow_new: bool) -> Result<usize> {
    let ungrouped = spheres.indices_where(|s| s.radius == radius && s.group.is_ungrouped());
    if ungrouped.is_empty() {
        log::debug!("No ungrouped spheres at radius {}", radius);
        return Ok(0);
    }

    let centers: Vec<[f64; 3]> = ungrouped
        .iter()
        .map(|&i| spheres.spheres()[i].center)
        .collect();
    let labels = spatial::connected_components(&centers, radius);
    let n_clusters = labels.iter().max().map_or(0, |&m| m + 1);

    let base = if allow_new {
        spheres.max_resolved_id()
    } else {
        spheres.max_pending_id()
    };
    let top = u64::from(base) + n_clusters as u64;
    if top > u64::from(u32::MAX) {
        return Err(SubpocketError::input(format!(
            "group ids exhausted clustering {} spheres at radius {}",
            ungrouped.len(),
            radius
        )));
    }

    let rows = spheres.spheres_mut();
    for (&row, &label) in ungrouped.iter().zip(&labels) {
        let id = base + 1 + label as u32;
        rows[row].group = if allow_new {
            Group::Resolved(id)
        } else {
            Group::Pending(id)
        };
    }

    log::debug!(
        "Clustered {} spheres at radius {} into {} {} groups",
        ungrouped.len(),
        radius,
        n_clusters,
        if allow_new { "new" } else { "pending" }
    );
    Ok(n_clusters)
}
