//! Greedy adjacency merging of groups
//!
//! Each iteration measures, for every candidate group, how strongly it is
//! linked to each resolved group at one sampling radius and performs the
//! single strongest merge. Merging one pair per iteration lets later
//! iterations see the updated adjacency graph.

use std::collections::BTreeMap;

use crate::errors::{ConvergenceStage, ConvergenceWarning};
use crate::spatial::KdTree;
use crate::spheres::{Group, SphereSet};

/// Neighbour search cutoff as a multiple of the sampling radius; two spheres
/// of that radius meeting at 45° from their closest point still count
pub const ADJACENCY_FACTOR: f64 = 1.41;

/// Strongest contact between a group and a resolved neighbour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linkage {
    pub source: Group,
    pub target: Group,
    /// Number of source spheres whose nearest resolved neighbour is in `target`
    pub strength: usize,
}

/// Find the resolved group most linked to `group` at `radius`
///
/// Every sphere of `group` at `radius` looks up its nearest sphere, at the
/// same radius, belonging to any other resolved group within
/// `ADJACENCY_FACTOR * radius`. The neighbour group that appears most often
/// wins; equal counts go to the smaller id. `None` when there is no contact.
pub fn identify_closest_grouped(spheres: &SphereSet, group: Group, radius: f64) -> Option<Linkage> {
    let mut query = Vec::new();
    let mut others = Vec::new();
    for s in spheres.iter().filter(|s| s.radius == radius) {
        if s.group == group {
            query.push(s.center);
        } else if s.group.is_resolved() {
            others.push((s.center, s.group));
        }
    }
    if query.is_empty() || others.is_empty() {
        return None;
    }

    let other_centers: Vec<[f64; 3]> = others.iter().map(|(c, _)| *c).collect();
    let tree = KdTree::build(&other_centers);
    let cutoff = ADJACENCY_FACTOR * radius;

    let mut counts: BTreeMap<Group, usize> = BTreeMap::new();
    for center in query {
        if let Some((index, _)) = tree.nearest_within(center, cutoff) {
            *counts.entry(others[index].1).or_insert(0) += 1;
        }
    }

    let mut best: Option<(Group, usize)> = None;
    for (target, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((target, count));
        }
    }

    best.map(|(target, strength)| Linkage {
        source: group,
        target,
        strength,
    })
}

/// Outcome of an [`AdjacencyMerger`] run
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// Merges performed, in order
    pub merges: Vec<Linkage>,
    /// Stopped because no listed group touched any resolved group
    pub exhausted_adjacency: bool,
    pub warning: Option<ConvergenceWarning>,
}

/// Iteratively folds listed groups into their most-linked resolved neighbour
#[derive(Debug, Clone)]
pub struct AdjacencyMerger {
    /// Sampling radius at which adjacency is measured
    pub radius: f64,
    /// Merge budget; defaults to the number of listed groups
    pub iterations: Option<usize>,
    /// Absorb the smaller of the two groups instead of always the source
    pub preserve_largest: bool,
}

impl AdjacencyMerger {
    pub fn new(radius: f64) -> Self {
        Self {
            radius,
            iterations: None,
            preserve_largest: false,
        }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn preserve_largest(mut self, preserve: bool) -> Self {
        self.preserve_largest = preserve;
        self
    }

    /// Strongest linkage among `groups`; ties go to the first listed group
    fn strongest_linkage(&self, spheres: &SphereSet, groups: &[Group]) -> Option<Linkage> {
        let mut best: Option<Linkage> = None;
        for &group in groups {
            if let Some(link) = identify_closest_grouped(spheres, group, self.radius) {
                if best.map_or(true, |b| link.strength > b.strength) {
                    best = Some(link);
                }
            }
        }
        best
    }

    /// Merge listed groups in place, one strongest linkage per iteration
    ///
    /// A convergence warning is attached only for the default budget: an
    /// explicit budget asks for exactly that many merges.
    pub fn merge(&self, spheres: &mut SphereSet, groups: &[Group]) -> MergeReport {
        let budget = self.iterations.unwrap_or(groups.len());
        let mut report = MergeReport::default();

        for _ in 0..budget {
            let Some(mut link) = self.strongest_linkage(spheres, groups) else {
                report.exhausted_adjacency = true;
                break;
            };

            if self.preserve_largest && link.source.is_resolved() {
                let counts = spheres.group_counts();
                let source_size = counts.get(&link.source).copied().unwrap_or(0);
                let target_size = counts.get(&link.target).copied().unwrap_or(0);
                if source_size > target_size {
                    std::mem::swap(&mut link.source, &mut link.target);
                }
            }

            let moved = spheres.reassign_group(link.source, link.target);
            log::debug!(
                "Merged group {} into {} (linkage {}, {} spheres)",
                link.source,
                link.target,
                link.strength,
                moved
            );
            report.merges.push(link);
        }

        if self.iterations.is_none() && !report.exhausted_adjacency && budget > 0 {
            let remaining = groups
                .iter()
                .filter(|&&g| identify_closest_grouped(spheres, g, self.radius).is_some())
                .count();
            if remaining > 0 {
                report.warning = Some(ConvergenceWarning::new(
                    ConvergenceStage::AdjacencyMerger,
                    budget,
                    remaining as f64,
                    format!("{} groups still linked at radius {}", remaining, self.radius),
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(group: f64, start: f64, count: usize, radius: f64) -> Vec<[f64; 5]> {
        (0..count)
            .map(|i| [start + i as f64, 0.0, 0.0, radius, group])
            .collect()
    }

    #[test]
    fn linkage_counts_nearest_neighbours() {
        let mut rows = line(-1.0, 0.0, 3, 1.0);
        rows.extend(line(1.0, 3.0, 3, 1.0));
        rows.extend(line(2.0, -3.0, 1, 1.0));
        let set = SphereSet::from_xyzrg(&rows).unwrap();

        let link = identify_closest_grouped(&set, Group::Pending(1), 1.0).unwrap();
        assert_eq!(link.target, Group::Resolved(1));
        assert_eq!(link.strength, 1);
    }

    #[test]
    fn no_contact_yields_none() {
        let mut rows = line(-1.0, 0.0, 3, 1.0);
        rows.extend(line(1.0, 50.0, 3, 1.0));
        let set = SphereSet::from_xyzrg(&rows).unwrap();
        assert!(identify_closest_grouped(&set, Group::Pending(1), 1.0).is_none());
    }

    #[test]
    fn contact_at_other_radius_is_ignored() {
        let mut rows = line(-1.0, 0.0, 3, 1.0);
        rows.extend(line(1.0, 3.0, 3, 2.0));
        let set = SphereSet::from_xyzrg(&rows).unwrap();
        assert!(identify_closest_grouped(&set, Group::Pending(1), 1.0).is_none());
    }

    #[test]
    fn pending_groups_fold_into_resolved() {
        // pending 1 touches resolved 1; pending 2 only touches pending 1
        let mut rows = line(1.0, 0.0, 5, 1.0);
        rows.extend(line(-1.0, 5.0, 3, 1.0));
        rows.extend(line(-2.0, 8.0, 3, 1.0));
        let mut set = SphereSet::from_xyzrg(&rows).unwrap();

        let report = AdjacencyMerger::new(1.0).merge(&mut set, &[Group::Pending(1), Group::Pending(2)]);
        assert_eq!(report.merges.len(), 2);
        assert!(report.warning.is_none());
        assert_eq!(set.distinct_groups(), vec![Group::Resolved(1)]);
    }

    #[test]
    fn strongest_linkage_merges_first() {
        let mut rows = line(1.0, 0.0, 10, 1.0);
        // group 2 touches group 1 along a long face, group 3 at a single point
        rows.extend((0..10).map(|i| [i as f64, 1.0, 0.0, 1.0, 2.0]));
        rows.extend(line(3.0, 10.0, 5, 1.0));
        let mut set = SphereSet::from_xyzrg(&rows).unwrap();

        let report = AdjacencyMerger::new(1.0)
            .with_iterations(1)
            .merge(&mut set, &[Group::Resolved(3), Group::Resolved(2)]);
        assert_eq!(report.merges.len(), 1);
        assert_eq!(report.merges[0].source, Group::Resolved(2));
        assert_eq!(report.merges[0].target, Group::Resolved(1));
        assert!(set.distinct_groups().contains(&Group::Resolved(3)));
    }

    #[test]
    fn preserve_largest_absorbs_the_smaller_group() {
        let mut rows = line(1.0, 0.0, 2, 1.0);
        rows.extend(line(2.0, 2.0, 8, 1.0));
        let mut set = SphereSet::from_xyzrg(&rows).unwrap();

        AdjacencyMerger::new(1.0)
            .with_iterations(1)
            .preserve_largest(true)
            .merge(&mut set, &[Group::Resolved(2)]);
        assert_eq!(set.distinct_groups(), vec![Group::Resolved(2)]);
    }

    #[test]
    fn surviving_listed_group_warns_when_budget_runs_out() {
        // group 2 is the larger side of both contacts, so it absorbs group 1
        // and is still touching group 3 after its single default merge
        let mut rows = line(1.0, 0.0, 2, 1.0);
        rows.extend(line(2.0, 2.0, 8, 1.0));
        rows.extend(line(3.0, 10.0, 2, 1.0));
        let mut set = SphereSet::from_xyzrg(&rows).unwrap();

        let report = AdjacencyMerger::new(1.0)
            .preserve_largest(true)
            .merge(&mut set, &[Group::Resolved(2)]);

        assert_eq!(report.merges.len(), 1);
        assert_eq!(report.merges[0].source, Group::Resolved(1));
        assert_eq!(report.merges[0].target, Group::Resolved(2));
        assert!(!report.exhausted_adjacency);

        let warning = report.warning.expect("merger should warn");
        assert_eq!(warning.stage, ConvergenceStage::AdjacencyMerger);
        assert_eq!(warning.iterations, 1);
        assert_eq!(warning.residual, 1.0);
        assert_eq!(set.resolved_groups(), vec![Group::Resolved(2), Group::Resolved(3)]);
    }

    #[test]
    fn disconnected_groups_exhaust_adjacency() {
        let mut rows = line(1.0, 0.0, 2, 1.0);
        rows.extend(line(2.0, 40.0, 2, 1.0));
        let mut set = SphereSet::from_xyzrg(&rows).unwrap();
        let report = AdjacencyMerger::new(1.0).merge(&mut set, &[Group::Resolved(2)]);
        assert!(report.exhausted_adjacency);
        assert!(report.merges.is_empty());
    }
}
