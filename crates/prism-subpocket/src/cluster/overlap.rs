//! Overlap removal between groups
//!
//! Treats every overlapping pair of differently-grouped spheres like a
//! compressed spring: both spheres step apart along their center line and
//! shrink by the same fraction of the overlap. With `static_last_group` only
//! the scanned group moves, twice as far, so the highest group stays fixed.

use std::collections::{BTreeSet, HashSet};

use nalgebra::Vector3;

use crate::errors::{ConvergenceStage, ConvergenceWarning};
use crate::spatial::{self, KdTree};
use crate::spheres::{Group, Sphere, SphereSet};

/// Fraction of the overlap applied per side when both sides move
///
/// 0.25 per side would close the gap exactly but approaches it only
/// asymptotically.
pub const SHARED_ADJUSTMENT: f64 = 0.26;
/// Fraction of the overlap applied when only the scanned side moves
pub const STATIC_ADJUSTMENT: f64 = 0.51;

/// Parameters for [`OverlapResolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapParams {
    /// Upper bounds of the radius bands to scan; `None` scans the whole set
    /// as one band below the largest radius
    pub radii: Option<Vec<f64>>,
    /// Width of each radius band `(R - spacing, R]`
    pub spacing: f64,
    /// Relaxation iterations per (band, group)
    pub iterations: usize,
    /// Overlap tolerated without correction (Å)
    pub tolerance: f64,
    pub static_last_group: bool,
}

impl Default for OverlapParams {
    fn default() -> Self {
        Self {
            radii: None,
            spacing: 0.1,
            iterations: 20,
            tolerance: 0.02,
            static_last_group: false,
        }
    }
}

impl OverlapParams {
    /// Scan the given radius bands
    pub fn banded(radii: Vec<f64>, spacing: f64) -> Self {
        Self {
            radii: Some(radii),
            spacing,
            ..Self::default()
        }
    }
}

/// Outcome of an [`OverlapResolver`] run
#[derive(Debug, Clone, Default)]
pub struct OverlapReport {
    /// Rows whose center or radius changed
    pub corrected_spheres: usize,
    /// One warning per (band, group) that hit the iteration cap
    pub warnings: Vec<ConvergenceWarning>,
}

impl OverlapReport {
    pub fn converged(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Iteratively separates spheres of different groups
#[derive(Debug, Clone, Default)]
pub struct OverlapResolver {
    params: OverlapParams,
}

impl OverlapResolver {
    pub fn new(params: OverlapParams) -> Self {
        Self { params }
    }

    /// Remove overlap between groups in place
    pub fn resolve(&self, spheres: &mut SphereSet) -> OverlapReport {
        let mut report = OverlapReport::default();
        if spheres.is_empty() {
            log::warn!("Attempting to remove overlap in an empty sphere set");
            return report;
        }

        let (radii, spacing) = match &self.params.radii {
            Some(radii) => (radii.clone(), self.params.spacing),
            None => {
                let max_radius = spheres.max_radius().unwrap_or(0.0);
                (vec![max_radius], max_radius)
            }
        };

        // the highest group is never scanned itself, only pushed against
        let mut groups = spheres.distinct_groups();
        groups.pop();

        for &radius in &radii {
            for &group in &groups {
                self.relax_band(spheres, group, radius, spacing, &mut report);
            }
        }

        log::debug!(
            "Overlap removal corrected {} spheres in {}",
            report.corrected_spheres,
            spheres.label()
        );
        report
    }

    fn relax_band(
        &self,
        spheres: &mut SphereSet,
        group: Group,
        radius: f64,
        spacing: f64,
        report: &mut OverlapReport,
    ) {
        let in_band = |s: &Sphere| s.radius > radius - spacing && s.radius <= radius;
        let group_rows = spheres.indices_where(|s| s.group == group && in_band(s));
        let other_rows = spheres.indices_where(|s| s.group != group && in_band(s));
        if group_rows.is_empty() || other_rows.is_empty() {
            return;
        }

        let mut group_data: Vec<Sphere> = group_rows.iter().map(|&i| spheres.spheres()[i]).collect();
        let mut other_data: Vec<Sphere> = other_rows.iter().map(|&i| spheres.spheres()[i]).collect();

        let other_centers: Vec<[f64; 3]> = other_data.iter().map(|s| s.center).collect();
        let other_tree = KdTree::build(&other_centers);
        let neighbors: Vec<Vec<usize>> = group_data
            .iter()
            .map(|s| {
                other_tree
                    .radius_search(s.center, 2.0 * radius)
                    .into_iter()
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        let factor = if self.params.static_last_group {
            STATIC_ADJUSTMENT
        } else {
            SHARED_ADJUSTMENT
        };
        let tolerance = self.params.tolerance;

        let mut altered_group = BTreeSet::new();
        let mut altered_other = BTreeSet::new();
        let mut converged = false;

        for _ in 0..self.params.iterations {
            let mut candidates = worst_overlaps(&group_data, &other_data, &neighbors, tolerance);
            if candidates.is_empty() {
                converged = true;
                break;
            }

            // each other-sphere pairs only with its most overlapping partner
            candidates.sort_by(|a, b| b.2.total_cmp(&a.2));
            let mut claimed = HashSet::new();
            candidates.retain(|&(_, o, _)| claimed.insert(o));

            for (g, o, overlap) in candidates {
                let adjustment = factor * overlap;
                let delta = Vector3::from(group_data[g].center) - Vector3::from(other_data[o].center);
                let norm = delta.norm();
                let step = if norm > f64::EPSILON {
                    delta * (adjustment / norm)
                } else {
                    Vector3::zeros()
                };

                let moved = Vector3::from(group_data[g].center) + step;
                group_data[g].center = [moved.x, moved.y, moved.z];
                group_data[g].radius = (group_data[g].radius - adjustment).max(0.0);
                altered_group.insert(g);

                if !self.params.static_last_group {
                    let moved = Vector3::from(other_data[o].center) - step;
                    other_data[o].center = [moved.x, moved.y, moved.z];
                    other_data[o].radius = (other_data[o].radius - adjustment).max(0.0);
                    altered_other.insert(o);
                }
            }
        }

        if !converged {
            let residual = worst_overlaps(&group_data, &other_data, &neighbors, tolerance)
                .iter()
                .map(|c| c.2)
                .fold(0.0, f64::max);
            if residual > tolerance {
                report.warnings.push(ConvergenceWarning::new(
                    ConvergenceStage::OverlapResolver,
                    self.params.iterations,
                    residual,
                    format!("group {} in radius band ({}, {}]", group, radius - spacing, radius),
                ));
            }
        }

        let rows = spheres.spheres_mut();
        for &g in &altered_group {
            rows[group_rows[g]] = group_data[g];
        }
        for &o in &altered_other {
            rows[other_rows[o]] = other_data[o];
        }
        report.corrected_spheres += altered_group.len() + altered_other.len();
    }
}

/// For each group sphere, its most overlapping candidate neighbour when the
/// overlap exceeds `tolerance`, as (group index, other index, overlap)
fn worst_overlaps(
    group_data: &[Sphere],
    other_data: &[Sphere],
    neighbors: &[Vec<usize>],
    tolerance: f64,
) -> Vec<(usize, usize, f64)> {
    let mut result = Vec::new();
    for (g, nlist) in neighbors.iter().enumerate() {
        let mut best: Option<(usize, f64)> = None;
        for &o in nlist {
            let overlap = other_data[o].radius + group_data[g].radius
                - spatial::distance(&other_data[o].center, &group_data[g].center);
            if best.map_or(true, |(_, b)| overlap > b) {
                best = Some((o, overlap));
            }
        }
        if let Some((o, overlap)) = best {
            if overlap > tolerance {
                result.push((g, o, overlap));
            }
        }
    }
    result
}
