//! Subpocket pipeline
//!
//! Drives one pocket through the whole subdivision: boundary sweep over the
//! sampling radii, hierarchical partitioning, two overlap passes, interior
//! pruning and per-group extraction ranked by volume.

use crate::cluster::{
    extract_groups, remove_interior, ExtractOptions, GroupNaming, HierarchicalPartitioner,
    OverlapResolver, PartitionParams, PartitionReport,
};
use crate::config::SubpocketConfig;
use crate::errors::{ConvergenceWarning, Result, SubpocketError};
use crate::spheres::{merge_sphere_list, SphereSet};
use crate::surface::{SurfaceBackend, SurfaceOptions, SurfaceSweep};

/// Protein spheres plus the boundary of the outer bulk-solvent surface
///
/// The bulk-solvent boundary is computed at `max_rad`; together with the
/// protein it encloses every candidate pocket.
pub fn exterior_spheres<B: SurfaceBackend>(protein: &SphereSet, backend: &B, max_rad: f64) -> Result<SphereSet> {
    if protein.is_empty() {
        return Err(SubpocketError::input("protein sphere set is empty"));
    }
    let boundary = backend
        .compute_surface(protein, max_rad, &SurfaceOptions::default())?
        .into_iter()
        .next()
        .ok_or_else(|| SubpocketError::surface(max_rad, "no boundary could be computed for these inputs"))?;
    log::debug!("Outer bulk-solvent surface calculated ({} boundary spheres)", boundary.len());

    let mut exterior = protein + &boundary;
    if let Some(name) = protein.name() {
        exterior.set_name(format!("{}_exterior", name));
    }
    Ok(exterior)
}

/// Result of [`SubpocketPipeline::subdivide`]
#[derive(Debug)]
pub struct SubpocketOutcome {
    /// One set per subpocket, largest volume first, meshes attached
    pub subpockets: Vec<SphereSet>,
    /// Sampling radii whose boundary surface could not be computed
    pub failed_radii: Vec<f64>,
    pub partition: PartitionReport,
    /// Partition and overlap warnings; volumes are approximate when present
    pub warnings: Vec<ConvergenceWarning>,
}

pub struct SubpocketPipeline {
    config: SubpocketConfig,
}

impl SubpocketPipeline {
    /// Build a pipeline from a configuration, applying radius constraints
    pub fn new(config: SubpocketConfig) -> Result<Self> {
        let config = config.constrained();
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SubpocketConfig {
        &self.config
    }

    /// Divide `pocket` into subpockets bounded by `exterior`
    ///
    /// `exterior` holds the protein and bulk-solvent boundary spheres (see
    /// [`exterior_spheres`]); `pocket` holds the interior spheres of the
    /// pocket to divide. A radius whose surface fails is skipped; the run
    /// fails only when every radius fails.
    pub fn subdivide<B: SurfaceBackend>(
        &self,
        backend: &B,
        exterior: &SphereSet,
        pocket: &SphereSet,
    ) -> Result<SubpocketOutcome> {
        let config = &self.config;
        if pocket.is_empty() {
            return Err(SubpocketError::input("pocket sphere set is empty"));
        }

        let nonextraneous = exterior.identify_nonextraneous(pocket, config.nonextraneous_radius());
        if nonextraneous.is_empty() {
            return Err(SubpocketError::input(format!(
                "no exterior spheres within {} A of the pocket",
                config.nonextraneous_radius()
            )));
        }

        let sampling_radii = config.sampling_radii();
        let surfaces = SurfaceSweep::new(SurfaceOptions::all_components())
            .with_workers(config.workers)
            .run(backend, &nonextraneous, &sampling_radii)?;

        let mut boundary_sets = Vec::new();
        let mut sampled_radii = Vec::new();
        let mut failed_radii = Vec::new();
        let mut first_error = None;
        for surface in surfaces {
            match surface.result {
                Ok(sets) => {
                    sampled_radii.push(surface.probe_radius);
                    boundary_sets.extend(sets);
                }
                Err(e) => {
                    failed_radii.push(surface.probe_radius);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if sampled_radii.is_empty() {
            return Err(first_error
                .unwrap_or_else(|| SubpocketError::input("no sampling radii between min_rad and max_subpocket_rad")));
        }
        if !failed_radii.is_empty() {
            log::warn!("Skipping {} sampling radii without a boundary: {:?}", failed_radii.len(), failed_radii);
        }

        let mut spheres = merge_sphere_list(boundary_sets.iter().map(Some), None, None)
            .ok_or_else(|| SubpocketError::input("boundary sweep produced no spheres"))?;
        if let Some(prefix) = &config.prefix {
            spheres.set_name(format!("{}_p0", prefix));
        }

        // failed radii are left out so propagation never skips a level
        let params = PartitionParams {
            ordered_radii: sampled_radii,
            ..config.partition_params()
        };
        let partition = HierarchicalPartitioner::new(params).partition(&mut spheres)?;
        let mut warnings = partition.warnings.clone();

        let banded = OverlapResolver::new(config.banded_overlap_params()).resolve(&mut spheres);
        warnings.extend(banded.warnings);
        let global = OverlapResolver::new(config.overlap.params()).resolve(&mut spheres);
        warnings.extend(global.warnings);

        remove_interior(&mut spheres);

        let options = ExtractOptions {
            include_ungrouped: false,
            surface_radius: Some(config.min_subpocket_surf_rad),
            naming: config
                .prefix
                .clone()
                .map_or(GroupNaming::None, GroupNaming::Prefix),
        };
        let subpockets = extract_groups(&spheres, &options, Some(backend as &dyn SurfaceBackend))?;
        log::info!("Subpockets identified: {}", subpockets.len());

        Ok(SubpocketOutcome {
            subpockets,
            failed_radii,
            partition,
            warnings,
        })
    }
}
