//! Split a partitioned cloud into one sphere set per group

use crate::errors::{Result, SubpocketError};
use crate::spheres::{Group, SphereSet};
use crate::surface::{SurfaceBackend, SurfaceOptions};

/// How extracted groups are named
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GroupNaming {
    #[default]
    None,
    /// `{prefix}_p0_sp{rank}` with the 1-based output position
    Prefix(String),
    /// One name per extracted group, in ascending group order
    Explicit(Vec<String>),
}

#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Also extract spheres whose group is not resolved
    pub include_ungrouped: bool,
    /// Probe radius for per-group boundary surfaces; enables volume ranking
    pub surface_radius: Option<f64>,
    pub naming: GroupNaming,
}

/// Extract every group as its own [`SphereSet`]
///
/// Without a surface radius the groups keep their ids and come back in
/// ascending group order. With one, each group is surfaced through
/// `backend`, groups are ordered by descending enclosed volume (ties keep
/// group order) and relabelled `Resolved(1..)` by rank, so group 1 is always
/// the largest. Explicit names stay with their group through the reordering.
pub fn extract_groups(
    spheres: &SphereSet,
    options: &ExtractOptions,
    backend: Option<&dyn SurfaceBackend>,
) -> Result<Vec<SphereSet>> {
    let groups: Vec<Group> = spheres
        .distinct_groups()
        .into_iter()
        .filter(|g| options.include_ungrouped || g.is_resolved())
        .collect();

    if let GroupNaming::Explicit(names) = &options.naming {
        if names.len() < groups.len() {
            return Err(SubpocketError::input(format!(
                "{} names supplied for {} groups",
                names.len(),
                groups.len()
            )));
        }
    }

    let mut extracted = Vec::with_capacity(groups.len());
    for (index, &group) in groups.iter().enumerate() {
        let members = spheres.iter().filter(|s| s.group == group).copied().collect();
        let mut set = SphereSet::new(members)?;
        if let GroupNaming::Explicit(names) = &options.naming {
            set.set_name(names[index].clone());
        }
        extracted.push(set);
    }
    log::debug!("Extracting {} groups from {}", extracted.len(), spheres.label());

    if let Some(surface_radius) = options.surface_radius {
        let backend = backend.ok_or_else(|| {
            SubpocketError::config("a surface backend is required to rank groups by volume")
        })?;
        extracted = rank_by_volume(extracted, backend, surface_radius)?;
    }

    if let GroupNaming::Prefix(prefix) = &options.naming {
        for (rank, set) in extracted.iter_mut().enumerate() {
            set.set_name(format!("{}_p0_sp{}", prefix, rank + 1));
        }
    }
    Ok(extracted)
}

fn rank_by_volume(
    groups: Vec<SphereSet>,
    backend: &dyn SurfaceBackend,
    surface_radius: f64,
) -> Result<Vec<SphereSet>> {
    let mut surfaced = Vec::with_capacity(groups.len());
    for mut set in groups {
        let components = backend.compute_surface(&set, surface_radius, &SurfaceOptions::default())?;
        let mesh = components
            .into_iter()
            .next()
            .and_then(|shell| shell.mesh().cloned())
            .ok_or_else(|| SubpocketError::surface(surface_radius, "no boundary could be computed for these inputs"))?;
        set.set_mesh(Some(mesh));
        surfaced.push(set);
    }

    // stable sort keeps group order among equal volumes
    surfaced.sort_by(|a, b| {
        let va = a.volume().unwrap_or(0.0);
        let vb = b.volume().unwrap_or(0.0);
        vb.total_cmp(&va)
    });

    for (rank, set) in surfaced.iter_mut().enumerate() {
        set.set_uniform_group(Group::Resolved(rank as u32 + 1));
    }
    Ok(surfaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spheres::BoundaryMesh;

    /// Volume proportional to sphere count
    struct CountingBackend;

    impl SurfaceBackend for CountingBackend {
        fn compute_surface(
            &self,
            spheres: &SphereSet,
            probe_radius: f64,
            _options: &SurfaceOptions,
        ) -> Result<Vec<SphereSet>> {
            let shell = SphereSet::from_xyz(&spheres.xyz(), Some(probe_radius))?
                .with_mesh(BoundaryMesh::volume_only(spheres.len() as f64));
            Ok(vec![shell])
        }
    }

    fn partitioned() -> SphereSet {
        let mut rows = Vec::new();
        for i in 0..2 {
            rows.push([i as f64, 0.0, 0.0, 1.0, 1.0]);
        }
        for i in 0..5 {
            rows.push([i as f64, 5.0, 0.0, 1.0, 2.0]);
        }
        for i in 0..3 {
            rows.push([i as f64, 10.0, 0.0, 1.0, 3.0]);
        }
        rows.push([0.0, 20.0, 0.0, 1.0, 0.0]);
        SphereSet::from_xyzrg(&rows).unwrap()
    }

    #[test]
    fn groups_come_back_in_id_order() {
        let sets = extract_groups(&partitioned(), &ExtractOptions::default(), None).unwrap();
        let sizes: Vec<usize> = sets.iter().map(SphereSet::len).collect();
        assert_eq!(sizes, vec![2, 5, 3]);
        assert_eq!(sets[1].distinct_groups(), vec![Group::Resolved(2)]);
    }

    #[test]
    fn ungrouped_spheres_on_request() {
        let options = ExtractOptions {
            include_ungrouped: true,
            ..ExtractOptions::default()
        };
        let sets = extract_groups(&partitioned(), &options, None).unwrap();
        assert_eq!(sets.len(), 4);
        assert_eq!(sets[0].distinct_groups(), vec![Group::Ungrouped]);
    }

    #[test]
    fn ranking_relabels_largest_first() {
        let options = ExtractOptions {
            surface_radius: Some(1.0),
            naming: GroupNaming::Prefix("pocket".to_string()),
            ..ExtractOptions::default()
        };
        let sets = extract_groups(&partitioned(), &options, Some(&CountingBackend)).unwrap();

        let sizes: Vec<usize> = sets.iter().map(SphereSet::len).collect();
        assert_eq!(sizes, vec![5, 3, 2]);
        for (rank, set) in sets.iter().enumerate() {
            assert_eq!(set.distinct_groups(), vec![Group::Resolved(rank as u32 + 1)]);
            assert_eq!(set.volume(), Some(set.len() as f64));
        }
        assert_eq!(sets[0].name(), Some("pocket_p0_sp1"));
        // former group 2 sits in row y = 5
        assert!(sets[0].iter().all(|s| s.center[1] == 5.0));
    }

    #[test]
    fn explicit_names_follow_their_group() {
        let options = ExtractOptions {
            surface_radius: Some(1.0),
            naming: GroupNaming::Explicit(vec!["a".into(), "b".into(), "c".into()]),
            ..ExtractOptions::default()
        };
        let sets = extract_groups(&partitioned(), &options, Some(&CountingBackend)).unwrap();
        let names: Vec<&str> = sets.iter().filter_map(SphereSet::name).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn too_few_names_is_an_input_error() {
        let options = ExtractOptions {
            naming: GroupNaming::Explicit(vec!["a".into()]),
            ..ExtractOptions::default()
        };
        assert!(matches!(
            extract_groups(&partitioned(), &options, None),
            Err(SubpocketError::InputError(_))
        ));
    }

    #[test]
    fn ranking_without_backend_is_rejected() {
        let options = ExtractOptions {
            surface_radius: Some(1.0),
            ..ExtractOptions::default()
        };
        assert!(extract_groups(&partitioned(), &options, None).is_err());
    }
}
