//! Multi-radius hierarchical partitioning
//!
//! ## Algorithm
//!
//! 1. Cluster the largest radius, creating resolved groups
//! 2. For each smaller radius: propagate groups from the previous radius,
//!    then cluster what is still ungrouped (new resolved groups only while
//!    the radius is at least `min_new_radius`, pending groups below it)
//! 3. Fold pending groups into their most-linked resolved group at the
//!    finest radius and discard everything left unresolved
//! 4. Fold undersized groups into their most-linked neighbour; drop the
//!    ones that stay undersized unless that would drop every group
//! 5. Merge weakest-first down to `max_clusters`

use crate::errors::{ConvergenceWarning, Result, SubpocketError};
use crate::spatial::KdTree;
use crate::spheres::{Group, SphereSet};

use super::merge::AdjacencyMerger;
use super::propagate::propagate_between_radii;
use super::within_radius::cluster_within_radius;

/// Parameters for [`HierarchicalPartitioner`]
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionParams {
    /// Sampling radii, strictly descending
    pub ordered_radii: Vec<f64>,
    /// Smallest radius allowed to seed new groups (default: smallest radius)
    pub min_new_radius: Option<f64>,
    /// Minimum number of spheres in a proper group
    pub min_cluster_size: usize,
    /// Maximum number of proper groups
    pub max_clusters: Option<usize>,
}

impl PartitionParams {
    pub fn new(ordered_radii: Vec<f64>) -> Self {
        Self {
            ordered_radii,
            min_new_radius: None,
            min_cluster_size: 10,
            max_clusters: None,
        }
    }

    pub fn with_min_new_radius(mut self, radius: f64) -> Self {
        self.min_new_radius = Some(radius);
        self
    }

    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    pub fn with_max_clusters(mut self, max_clusters: Option<usize>) -> Self {
        self.max_clusters = max_clusters;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.ordered_radii.is_empty() {
            return Err(SubpocketError::input("at least one sampling radius is required"));
        }
        if let Some(r) = self
            .ordered_radii
            .iter()
            .find(|r| !r.is_finite() || **r <= 0.0)
        {
            return Err(SubpocketError::input(format!("invalid sampling radius {}", r)));
        }
        if self.ordered_radii.windows(2).any(|w| w[0] <= w[1]) {
            return Err(SubpocketError::input(format!(
                "sampling radii must be strictly descending: {:?}",
                self.ordered_radii
            )));
        }
        if self.max_clusters == Some(0) {
            return Err(SubpocketError::input("max_clusters must be at least 1"));
        }
        Ok(())
    }
}

/// Bookkeeping returned by [`HierarchicalPartitioner::partition`]
#[derive(Debug, Clone, Default)]
pub struct PartitionReport {
    /// Resolved groups in the final partition
    pub groups: usize,
    pub pending_merges: usize,
    pub small_group_merges: usize,
    pub ceiling_merges: usize,
    /// Spheres discarded as ungrouped or pending
    pub removed_spheres: usize,
    /// Undersized groups dropped after the merge pass
    pub dropped_groups: Vec<Group>,
    pub warnings: Vec<ConvergenceWarning>,
}

/// Clusters spheres coarse-to-fine across sampling radii
#[derive(Debug, Clone)]
pub struct HierarchicalPartitioner {
    params: PartitionParams,
}

impl HierarchicalPartitioner {
    pub fn new(params: PartitionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PartitionParams {
        &self.params
    }

    /// Partition `spheres` in place into resolved groups
    pub fn partition(&self, spheres: &mut SphereSet) -> Result<PartitionReport> {
        self.params.validate()?;
        if spheres.is_empty() {
            return Err(SubpocketError::input("cannot partition an empty sphere set"));
        }

        self.naive_sweep(spheres)?;
        log::debug!("Finished naive sphere clustering for spheres in {}", spheres.label());

        let report = self.resolve_improperly_grouped(spheres);
        log::debug!(
            "Finished hierarchically clustering spheres in {}: {} groups",
            spheres.label(),
            report.groups
        );
        Ok(report)
    }

    fn naive_sweep(&self, spheres: &mut SphereSet) -> Result<()> {
        let radii = &self.params.ordered_radii;
        let min_new_radius = self
            .params
            .min_new_radius
            .unwrap_or_else(|| radii[radii.len() - 1]);

        for (index, &radius) in radii.iter().enumerate() {
            if index > 0 {
                propagate_between_radii(spheres, radii[index - 1], radius);
            }
            cluster_within_radius(spheres, radius, radius >= min_new_radius)?;
        }
        Ok(())
    }

    fn resolve_improperly_grouped(&self, spheres: &mut SphereSet) -> PartitionReport {
        let radius = self.params.ordered_radii[self.params.ordered_radii.len() - 1];
        let merger = AdjacencyMerger::new(radius);
        let mut report = PartitionReport::default();

        // pending groups fold into resolved ones only
        let mut pending: Vec<Group> = spheres
            .distinct_groups()
            .into_iter()
            .filter(|g| g.is_pending())
            .collect();
        pending.reverse(); // ascending pending id
        if !pending.is_empty() {
            let merged = merger.merge(spheres, &pending);
            report.pending_merges = merged.merges.len();
            report.warnings.extend(merged.warning);
        }
        report.removed_spheres = spheres.remove_ungrouped();

        let small = self.undersized_groups(spheres);
        if !small.is_empty() {
            let merged = merger.merge(spheres, &small);
            report.small_group_merges = merged.merges.len();
            report.warnings.extend(merged.warning);

            let still_small = self.undersized_groups(spheres);
            let total = spheres.resolved_groups().len();
            if !still_small.is_empty() && still_small.len() < total {
                let removed = spheres.remove_groups(&still_small);
                log::debug!(
                    "Dropped {} undersized groups ({} spheres)",
                    still_small.len(),
                    removed
                );
                report.dropped_groups = still_small;
            }
        }

        if let Some(max_clusters) = self.params.max_clusters {
            report.ceiling_merges = self.enforce_ceiling(spheres, &merger, max_clusters);
        }

        report.groups = spheres.resolved_groups().len();
        if report.groups == 0 {
            log::warn!("No resolved groups survived partitioning of {}", spheres.label());
        }
        report
    }

    fn undersized_groups(&self, spheres: &SphereSet) -> Vec<Group> {
        spheres
            .group_counts()
            .into_iter()
            .filter(|(g, count)| g.is_resolved() && *count < self.params.min_cluster_size)
            .map(|(g, _)| g)
            .collect()
    }

    fn enforce_ceiling(&self, spheres: &mut SphereSet, merger: &AdjacencyMerger, max_clusters: usize) -> usize {
        let groups = spheres.resolved_groups();
        if groups.len() <= max_clusters {
            return 0;
        }

        let excess = groups.len() - max_clusters;
        let merged = merger
            .clone()
            .with_iterations(excess)
            .merge(spheres, &groups);
        let mut merges = merged.merges.len();

        // disconnected remnants: fold smallest into the group owning its nearest sphere
        while spheres.resolved_groups().len() > max_clusters {
            match fold_smallest_into_nearest(spheres) {
                Some((source, target)) => {
                    log::debug!(
                        "Folded disconnected group {} into nearest group {}",
                        source,
                        target
                    );
                    merges += 1;
                }
                None => break,
            }
        }
        merges
    }
}

/// Reassign the smallest resolved group to the resolved group owning the
/// sphere closest to any of its members (any radius)
fn fold_smallest_into_nearest(spheres: &mut SphereSet) -> Option<(Group, Group)> {
    let counts = spheres.group_counts();
    let (source, _) = counts
        .iter()
        .filter(|(g, _)| g.is_resolved())
        .min_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))?;
    let source = *source;

    let others: Vec<&crate::spheres::Sphere> = spheres
        .iter()
        .filter(|s| s.group.is_resolved() && s.group != source)
        .collect();
    let centers: Vec<[f64; 3]> = others.iter().map(|s| s.center).collect();
    let tree = KdTree::build(&centers);

    let (index, _) = spheres
        .iter()
        .filter(|s| s.group == source)
        .filter_map(|s| tree.nearest(s.center))
        .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))?;
    let target = others[index].group;

    spheres.reassign_group(source, target);
    Some((source, target))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(center: [f64; 3], radius: f64, n_side: usize, spacing: f64) -> Vec<[f64; 4]> {
        let mut rows = Vec::new();
        let offset = (n_side as f64 - 1.0) * spacing / 2.0;
        for i in 0..n_side {
            for j in 0..n_side {
                for k in 0..n_side {
                    rows.push([
                        center[0] + i as f64 * spacing - offset,
                        center[1] + j as f64 * spacing - offset,
                        center[2] + k as f64 * spacing - offset,
                        radius,
                    ]);
                }
            }
        }
        rows
    }

    #[test]
    fn rejects_bad_radii_and_empty_sets() {
        let mut set = SphereSet::from_xyzr(&blob([0.0; 3], 1.0, 2, 1.0), None).unwrap();
        let ascending = HierarchicalPartitioner::new(PartitionParams::new(vec![1.0, 2.0]));
        assert!(ascending.partition(&mut set).is_err());

        let mut empty = SphereSet::empty();
        let ok = HierarchicalPartitioner::new(PartitionParams::new(vec![2.0, 1.0]));
        assert!(matches!(
            ok.partition(&mut empty),
            Err(SubpocketError::InputError(_))
        ));
    }

    #[test]
    fn coarse_groups_cascade_to_fine_radius() {
        let mut rows = blob([0.0; 3], 2.0, 2, 1.5);
        rows.extend(blob([0.0; 3], 1.0, 3, 0.8));
        let mut set = SphereSet::from_xyzr(&rows, None).unwrap();

        let report = HierarchicalPartitioner::new(
            PartitionParams::new(vec![2.0, 1.0]).with_min_cluster_size(1),
        )
        .partition(&mut set)
        .unwrap();

        assert_eq!(report.groups, 1);
        assert_eq!(set.distinct_groups(), vec![Group::Resolved(1)]);
        assert_eq!(set.len(), 8 + 27);
    }

    #[test]
    fn fine_detail_below_min_new_radius_is_folded() {
        let mut rows = blob([0.0; 3], 2.0, 2, 1.5);
        rows.extend(blob([0.0; 3], 1.0, 3, 0.8));
        // a channel visible only at the fine radius, touching the blob
        rows.extend((1..6).map(|i| [1.0 + 0.8 * i as f64, 0.0, 0.0, 1.0]));
        let mut set = SphereSet::from_xyzr(&rows, None).unwrap();

        let report = HierarchicalPartitioner::new(
            PartitionParams::new(vec![2.0, 1.0])
                .with_min_new_radius(1.5)
                .with_min_cluster_size(1),
        )
        .partition(&mut set)
        .unwrap();

        assert_eq!(report.groups, 1);
        assert!(set.groups().iter().all(|g| g.is_resolved()));
    }

    #[test]
    fn sparse_pending_labels_fold_in_one_merge() {
        let mut set = SphereSet::from_xyzrg(&[
            [0.0, 0.0, 0.0, 1.0, 1.0],
            [1.0, 0.0, 0.0, 1.0, 1.0],
            [2.0, 0.0, 0.0, 1.0, -20_000_000.0],
        ])
        .unwrap();

        let report = HierarchicalPartitioner::new(
            PartitionParams::new(vec![1.0]).with_min_cluster_size(1),
        )
        .partition(&mut set)
        .unwrap();

        assert_eq!(report.pending_merges, 1);
        assert!(report.warnings.is_empty());
        assert_eq!(set.len(), 3);
        assert_eq!(set.distinct_groups(), vec![Group::Resolved(1)]);
    }

    #[test]
    fn isolated_pending_spheres_are_discarded() {
        let mut rows = blob([0.0; 3], 2.0, 2, 1.5);
        rows.extend(blob([0.0; 3], 1.0, 2, 0.8));
        rows.push([40.0, 0.0, 0.0, 1.0]);
        let mut set = SphereSet::from_xyzr(&rows, None).unwrap();

        let report = HierarchicalPartitioner::new(
            PartitionParams::new(vec![2.0, 1.0])
                .with_min_new_radius(1.5)
                .with_min_cluster_size(1),
        )
        .partition(&mut set)
        .unwrap();

        assert_eq!(report.removed_spheres, 1);
        assert!(set.iter().all(|s| s.center[0] < 40.0));
    }

    #[test]
    fn ceiling_folds_disconnected_groups() {
        let mut rows = blob([0.0; 3], 1.0, 2, 0.5);
        rows.extend(blob([10.0, 0.0, 0.0], 1.0, 2, 0.5));
        rows.extend(blob([30.0, 0.0, 0.0], 1.0, 3, 0.5));
        let mut set = SphereSet::from_xyzr(&rows, None).unwrap();

        let report = HierarchicalPartitioner::new(
            PartitionParams::new(vec![1.0])
                .with_min_cluster_size(1)
                .with_max_clusters(Some(2)),
        )
        .partition(&mut set)
        .unwrap();

        assert_eq!(report.groups, 2);
        assert_eq!(set.len(), 8 + 8 + 27);
    }

    #[test]
    fn all_undersized_groups_are_kept() {
        let mut rows = blob([0.0; 3], 1.0, 2, 0.5);
        rows.extend(blob([10.0, 0.0, 0.0], 1.0, 2, 0.5));
        let mut set = SphereSet::from_xyzr(&rows, None).unwrap();

        let report = HierarchicalPartitioner::new(
            PartitionParams::new(vec![1.0]).with_min_cluster_size(50),
        )
        .partition(&mut set)
        .unwrap();

        assert_eq!(report.groups, 2);
        assert!(report.dropped_groups.is_empty());
    }
}
