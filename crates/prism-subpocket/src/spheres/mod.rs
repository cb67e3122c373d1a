//! Sphere cloud data model
//!
//! A [`SphereSet`] owns an ordered collection of `(center, radius, group)`
//! records. Constructors and bulk setters validate finiteness and drop rows
//! that exactly duplicate an earlier row, keeping first occurrences in order.

pub mod group;
pub mod io;
pub mod mesh;

pub use group::Group;
pub use mesh::BoundaryMesh;

use std::collections::{BTreeMap, HashSet};
use std::ops::Add;

use crate::errors::{Result, SubpocketError};
use crate::spatial::{self, KdTree};

/// One sphere of a cloud
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: [f64; 3],
    pub radius: f64,
    pub group: Group,
}

impl Sphere {
    pub fn new(center: [f64; 3], radius: f64, group: Group) -> Self {
        Self {
            center,
            radius,
            group,
        }
    }

    /// `[x, y, z, r, g]` row with the signed group label
    pub fn row(&self) -> [f64; 5] {
        [
            self.center[0],
            self.center[1],
            self.center[2],
            self.radius,
            self.group.as_f64(),
        ]
    }

    /// Surface overlap: positive when the two volumes intersect
    #[inline]
    pub fn overlap(&self, other: &Sphere) -> f64 {
        self.radius + other.radius - spatial::distance(&self.center, &other.center)
    }

    // `+ 0.0` folds -0.0 into 0.0 so both compare equal
    fn key(&self) -> [u64; 5] {
        let row = self.row();
        [
            (row[0] + 0.0).to_bits(),
            (row[1] + 0.0).to_bits(),
            (row[2] + 0.0).to_bits(),
            (row[3] + 0.0).to_bits(),
            (row[4] + 0.0).to_bits(),
        ]
    }

    fn validate(&self, row: usize) -> Result<()> {
        if self.center.iter().any(|c| !c.is_finite()) {
            return Err(SubpocketError::input(format!(
                "row {} has a non-finite center {:?}",
                row, self.center
            )));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(SubpocketError::input(format!(
                "row {} has an invalid radius {}",
                row, self.radius
            )));
        }
        Ok(())
    }
}

/// Owned, mutable cloud of spheres with an optional boundary mesh and name
#[derive(Debug, Clone, Default)]
pub struct SphereSet {
    spheres: Vec<Sphere>,
    mesh: Option<BoundaryMesh>,
    name: Option<String>,
}

fn dedup(spheres: Vec<Sphere>) -> Vec<Sphere> {
    let mut seen = HashSet::with_capacity(spheres.len());
    spheres.into_iter().filter(|s| seen.insert(s.key())).collect()
}

fn validated(spheres: Vec<Sphere>) -> Result<Vec<Sphere>> {
    for (row, sphere) in spheres.iter().enumerate() {
        sphere.validate(row)?;
    }
    Ok(dedup(spheres))
}

impl SphereSet {
    /// Validate and deduplicate a list of spheres
    pub fn new(spheres: Vec<Sphere>) -> Result<Self> {
        Ok(Self {
            spheres: validated(spheres)?,
            mesh: None,
            name: None,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Full 5-column records `x y z r g`
    pub fn from_xyzrg(rows: &[[f64; 5]]) -> Result<Self> {
        let mut set = Self::empty();
        set.set_xyzrg(rows)?;
        Ok(set)
    }

    /// Centers and radii; groups default to ungrouped
    pub fn from_xyzr(rows: &[[f64; 4]], groups: Option<&[Group]>) -> Result<Self> {
        let mut spheres: Vec<Sphere> = rows
            .iter()
            .map(|r| Sphere::new([r[0], r[1], r[2]], r[3], Group::Ungrouped))
            .collect();
        if let Some(groups) = groups {
            if groups.len() != rows.len() {
                return Err(SubpocketError::input(format!(
                    "{} group values supplied for {} rows",
                    groups.len(),
                    rows.len()
                )));
            }
            for (sphere, &group) in spheres.iter_mut().zip(groups) {
                sphere.group = group;
            }
        }
        Self::new(spheres)
    }

    /// Centers only; radius defaults to 0 unless supplied
    pub fn from_xyz(rows: &[[f64; 3]], radius: Option<f64>) -> Result<Self> {
        let radius = radius.unwrap_or(0.0);
        Self::new(
            rows.iter()
                .map(|&c| Sphere::new(c, radius, Group::Ungrouped))
                .collect(),
        )
    }

    /// Rows of 3, 4 or 5 columns; every row must have the same width
    pub fn from_table(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(width) = rows.first().map(Vec::len) else {
            return Ok(Self::empty());
        };
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(SubpocketError::input(format!(
                "row {} has {} columns; expected {}",
                index,
                row.len(),
                width
            )));
        }

        let mut spheres = Vec::with_capacity(rows.len());
        for row in rows {
            let sphere = match width {
                3 => Sphere::new([row[0], row[1], row[2]], 0.0, Group::Ungrouped),
                4 => Sphere::new([row[0], row[1], row[2]], row[3], Group::Ungrouped),
                5 => Sphere::new([row[0], row[1], row[2]], row[3], Group::from_label(row[4])?),
                other => {
                    return Err(SubpocketError::input(format!(
                        "sphere arrays need 3, 4 or 5 columns ({} provided)",
                        other
                    )))
                }
            };
            spheres.push(sphere);
        }
        Self::new(spheres)
    }

    /// Boundary spheres from surface vertices and normals
    ///
    /// Each `[vx, vy, vz, nx, ny, nz]` row yields a sphere of `probe_radius`
    /// centered at `v + probe_radius * n`; centers closer than 0.01 Å collapse.
    pub fn from_boundary_vertices(vertices: &[[f64; 6]], probe_radius: f64) -> Result<Self> {
        let spheres = vertices
            .iter()
            .map(|v| {
                Sphere::new(
                    [
                        v[0] + probe_radius * v[3],
                        v[1] + probe_radius * v[4],
                        v[2] + probe_radius * v[5],
                    ],
                    probe_radius,
                    Group::Ungrouped,
                )
            })
            .collect();
        let mut set = Self::new(spheres)?;
        set.remove_duplicates(0.01);
        Ok(set)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mesh(mut self, mesh: BoundaryMesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn mesh(&self) -> Option<&BoundaryMesh> {
        self.mesh.as_ref()
    }

    pub fn set_mesh(&mut self, mesh: Option<BoundaryMesh>) {
        self.mesh = mesh;
    }

    /// Enclosed volume of the boundary mesh, if one has been computed
    pub fn volume(&self) -> Option<f64> {
        self.mesh.as_ref().map(|m| m.volume)
    }

    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sphere> {
        self.spheres.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Sphere> {
        self.spheres.get(index)
    }

    /// In-place access for stages that move or regroup spheres without
    /// changing the row count
    pub(crate) fn spheres_mut(&mut self) -> &mut [Sphere] {
        &mut self.spheres
    }

    // --- projections ---

    pub fn xyzrg(&self) -> Vec<[f64; 5]> {
        self.spheres.iter().map(Sphere::row).collect()
    }

    pub fn xyzr(&self) -> Vec<[f64; 4]> {
        self.spheres
            .iter()
            .map(|s| [s.center[0], s.center[1], s.center[2], s.radius])
            .collect()
    }

    pub fn xyz(&self) -> Vec<[f64; 3]> {
        self.spheres.iter().map(|s| s.center).collect()
    }

    pub fn radii(&self) -> Vec<f64> {
        self.spheres.iter().map(|s| s.radius).collect()
    }

    pub fn groups(&self) -> Vec<Group> {
        self.spheres.iter().map(|s| s.group).collect()
    }

    // --- bulk mutators ---

    /// Replace every row from full 5-column records
    pub fn set_xyzrg(&mut self, rows: &[[f64; 5]]) -> Result<()> {
        let mut spheres = Vec::with_capacity(rows.len());
        for r in rows {
            spheres.push(Sphere::new(
                [r[0], r[1], r[2]],
                r[3],
                Group::from_label(r[4])?,
            ));
        }
        self.spheres = validated(spheres)?;
        Ok(())
    }

    /// Replace every row from centers and radii; groups reset to ungrouped
    pub fn set_xyzr(&mut self, rows: &[[f64; 4]]) -> Result<()> {
        let spheres = rows
            .iter()
            .map(|r| Sphere::new([r[0], r[1], r[2]], r[3], Group::Ungrouped))
            .collect();
        self.spheres = validated(spheres)?;
        Ok(())
    }

    /// Replace every row from centers; radii reset to 0 and groups to ungrouped
    pub fn set_xyz(&mut self, rows: &[[f64; 3]]) -> Result<()> {
        let spheres = rows
            .iter()
            .map(|&c| Sphere::new(c, 0.0, Group::Ungrouped))
            .collect();
        self.spheres = validated(spheres)?;
        Ok(())
    }

    pub fn set_radii(&mut self, radii: &[f64]) -> Result<()> {
        if radii.len() != self.spheres.len() {
            return Err(SubpocketError::input(format!(
                "number of radii ({}) must match the number of rows ({})",
                radii.len(),
                self.spheres.len()
            )));
        }
        let mut spheres = self.spheres.clone();
        for (sphere, &radius) in spheres.iter_mut().zip(radii) {
            sphere.radius = radius;
        }
        self.spheres = validated(spheres)?;
        Ok(())
    }

    pub fn set_uniform_radius(&mut self, radius: f64) -> Result<()> {
        let radii = vec![radius; self.spheres.len()];
        self.set_radii(&radii)
    }

    pub fn set_groups(&mut self, groups: &[Group]) -> Result<()> {
        if groups.len() != self.spheres.len() {
            return Err(SubpocketError::input(format!(
                "number of group values ({}) must match the number of rows ({})",
                groups.len(),
                self.spheres.len()
            )));
        }
        for (sphere, &group) in self.spheres.iter_mut().zip(groups) {
            sphere.group = group;
        }
        self.spheres = dedup(std::mem::take(&mut self.spheres));
        Ok(())
    }

    pub fn set_uniform_group(&mut self, group: Group) {
        for sphere in &mut self.spheres {
            sphere.group = group;
        }
        self.spheres = dedup(std::mem::take(&mut self.spheres));
    }

    // --- combination ---

    /// New set holding the rows of both operands; meshes are not carried
    pub fn concat(&self, other: Option<&SphereSet>) -> SphereSet {
        let mut spheres = self.spheres.clone();
        if let Some(other) = other {
            spheres.extend_from_slice(&other.spheres);
        }
        SphereSet {
            spheres: dedup(spheres),
            mesh: None,
            name: None,
        }
    }

    // --- deletion (mask based) ---

    /// Keep rows matching `keep`; returns the number of rows removed
    pub fn retain<F: FnMut(&Sphere) -> bool>(&mut self, keep: F) -> usize {
        let before = self.spheres.len();
        self.spheres.retain(keep);
        let removed = before - self.spheres.len();
        if removed > 0 {
            self.mesh = None;
        }
        removed
    }

    /// Remove every sphere that is not in a resolved group
    pub fn remove_ungrouped(&mut self) -> usize {
        let removed = self.retain(|s| s.group.is_resolved());
        if removed > 0 {
            log::debug!("{} ungrouped spheres removed from {}", removed, self.label());
        }
        removed
    }

    pub fn remove_groups(&mut self, groups: &[Group]) -> usize {
        let doomed: HashSet<Group> = groups.iter().copied().collect();
        self.retain(|s| !doomed.contains(&s.group))
    }

    /// Collapse spheres whose centers chain together within `eps`, keeping
    /// the first member of each chain
    pub fn remove_duplicates(&mut self, eps: f64) -> usize {
        let labels = spatial::connected_components(&self.xyz(), eps);
        let mut seen = HashSet::new();
        let mut keep = labels.into_iter().map(|label| seen.insert(label));
        self.retain(|_| keep.next().unwrap_or(true))
    }

    // --- group bookkeeping ---

    /// Reassign every sphere of `source` to `target`; returns spheres moved
    ///
    /// Rows that become identical to an existing row are collapsed.
    pub fn reassign_group(&mut self, source: Group, target: Group) -> usize {
        let mut moved = 0;
        for sphere in self.spheres.iter_mut().filter(|s| s.group == source) {
            sphere.group = target;
            moved += 1;
        }
        if moved > 0 {
            self.spheres = dedup(std::mem::take(&mut self.spheres));
        }
        moved
    }

    /// Population of every group present, ordered by label
    pub fn group_counts(&self) -> BTreeMap<Group, usize> {
        let mut counts = BTreeMap::new();
        for sphere in &self.spheres {
            *counts.entry(sphere.group).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct groups, ordered by label
    pub fn distinct_groups(&self) -> Vec<Group> {
        self.group_counts().into_keys().collect()
    }

    /// Distinct resolved groups, ordered by id
    pub fn resolved_groups(&self) -> Vec<Group> {
        self.group_counts()
            .into_keys()
            .filter(|g| g.is_resolved())
            .collect()
    }

    /// Largest resolved id present (0 when none)
    pub fn max_resolved_id(&self) -> u32 {
        self.spheres
            .iter()
            .filter_map(|s| s.group.resolved_id())
            .max()
            .unwrap_or(0)
    }

    /// Largest pending id present (0 when none)
    pub fn max_pending_id(&self) -> u32 {
        self.spheres
            .iter()
            .filter_map(|s| match s.group {
                Group::Pending(id) => Some(id),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Distinct radius values, largest first
    pub fn radius_values(&self) -> Vec<f64> {
        let mut radii = self.radii();
        radii.sort_by(|a, b| b.total_cmp(a));
        radii.dedup();
        radii
    }

    pub fn max_radius(&self) -> Option<f64> {
        self.spheres.iter().map(|s| s.radius).reduce(f64::max)
    }

    pub fn min_radius(&self) -> Option<f64> {
        self.spheres.iter().map(|s| s.radius).reduce(f64::min)
    }

    /// Row indices whose sphere satisfies `pred`
    pub fn indices_where<F: Fn(&Sphere) -> bool>(&self, pred: F) -> Vec<usize> {
        self.spheres
            .iter()
            .enumerate()
            .filter_map(|(i, s)| pred(s).then_some(i))
            .collect()
    }

    // --- neighborhood queries ---

    /// Spheres whose centers lie within `radius` of any center in `reference`
    pub fn identify_nonextraneous(&self, reference: &SphereSet, radius: f64) -> SphereSet {
        let tree = KdTree::build(&self.xyz());
        let mut selected = vec![false; self.spheres.len()];
        for sphere in &reference.spheres {
            for (index, _) in tree.radius_search(sphere.center, radius) {
                selected[index] = true;
            }
        }

        let spheres = self
            .spheres
            .iter()
            .zip(&selected)
            .filter_map(|(s, &keep)| keep.then_some(*s))
            .collect();
        log::debug!("Non-extraneous spheres selected from {}", self.label());
        SphereSet {
            spheres,
            mesh: None,
            name: None,
        }
    }

    /// Index of the sphere closest to `coordinate`, optionally restricted to
    /// spheres with radius `<= max_radius`
    pub fn nearest(&self, coordinate: [f64; 3], max_radius: Option<f64>) -> Option<usize> {
        self.spheres
            .iter()
            .enumerate()
            .filter(|(_, s)| max_radius.map_or(true, |max| s.radius <= max))
            .map(|(i, s)| (i, spatial::distance(&s.center, &coordinate)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Center of the sphere closest to any of `coordinates`
    pub fn nearest_coord_to_external(&self, coordinates: &[[f64; 3]]) -> Option<[f64; 3]> {
        let tree = KdTree::build(&self.xyz());
        coordinates
            .iter()
            .filter_map(|&c| tree.nearest(c))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| self.spheres[index].center)
    }

    /// Group of the closest sphere for each external coordinate
    ///
    /// `None` when the coordinate lies more than `tolerance` outside the
    /// surface of its nearest sphere.
    pub fn propagate_groups_to_external(
        &self,
        coordinates: &[[f64; 3]],
        tolerance: f64,
    ) -> Vec<Option<Group>> {
        let tree = KdTree::build(&self.xyz());
        coordinates
            .iter()
            .map(|&c| {
                tree.nearest(c).and_then(|(index, dist)| {
                    let sphere = &self.spheres[index];
                    (dist - sphere.radius <= tolerance).then_some(sphere.group)
                })
            })
            .collect()
    }
}

impl Add<&SphereSet> for &SphereSet {
    type Output = SphereSet;

    fn add(self, other: &SphereSet) -> SphereSet {
        self.concat(Some(other))
    }
}

/// Merge several optional sphere sets, optionally keeping only one radius
/// and/or one group; `None` when nothing survives the filters
pub fn merge_sphere_list<'a, I>(sets: I, radius: Option<f64>, group: Option<Group>) -> Option<SphereSet>
where
    I: IntoIterator<Item = Option<&'a SphereSet>>,
{
    let spheres: Vec<Sphere> = sets
        .into_iter()
        .flatten()
        .flat_map(|set| set.spheres.iter())
        .filter(|s| radius.map_or(true, |r| s.radius == r))
        .filter(|s| group.map_or(true, |g| s.group == g))
        .copied()
        .collect();

    if spheres.is_empty() {
        None
    } else {
        Some(SphereSet {
            spheres: dedup(spheres),
            mesh: None,
            name: None,
        })
    }
}
