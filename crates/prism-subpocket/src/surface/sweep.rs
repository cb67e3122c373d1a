//! Parallel boundary-surface sweep over probe radii

use rayon::prelude::*;

use super::{SurfaceBackend, SurfaceOptions};
use crate::errors::{Result, SubpocketError};
use crate::spheres::SphereSet;

/// Surface result for one probe radius
#[derive(Debug)]
pub struct RadiusSurface {
    pub probe_radius: f64,
    pub result: Result<Vec<SphereSet>>,
}

/// Computes one boundary surface per probe radius on a dedicated worker pool
///
/// Each worker receives its own copy of the input cloud. Results come back in
/// the order of the requested radii once every worker has finished; a failed
/// radius is logged and reported without affecting the others.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSweep {
    workers: Option<usize>,
    options: SurfaceOptions,
}

impl SurfaceSweep {
    pub fn new(options: SurfaceOptions) -> Self {
        Self {
            workers: None,
            options,
        }
    }

    /// Pool size; `None` uses the available parallelism
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    pub fn run<B>(&self, backend: &B, spheres: &SphereSet, radii: &[f64]) -> Result<Vec<RadiusSurface>>
    where
        B: SurfaceBackend + ?Sized,
    {
        let threads = self
            .workers
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("surface-sweep-{}", i))
            .build()
            .map_err(|e| SubpocketError::WorkerPool(e.to_string()))?;

        log::info!(
            "Computing {} boundary surfaces of {} on {} workers",
            radii.len(),
            spheres.label(),
            threads
        );

        let results: Vec<RadiusSurface> = pool.install(|| {
            radii
                .par_iter()
                .map(|&probe_radius| {
                    let input = spheres.clone();
                    let result = backend.compute_surface(&input, probe_radius, &self.options);
                    if let Err(e) = &result {
                        log::warn!("Boundary surface at probe radius {} failed: {}", probe_radius, e);
                    }
                    RadiusSurface {
                        probe_radius,
                        result,
                    }
                })
                .collect()
        });

        let failed = results.iter().filter(|r| r.result.is_err()).count();
        log::debug!("Surface sweep finished: {} ok, {} failed", results.len() - failed, failed);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spheres::BoundaryMesh;

    struct ShellBackend;

    impl SurfaceBackend for ShellBackend {
        fn compute_surface(
            &self,
            spheres: &SphereSet,
            probe_radius: f64,
            options: &SurfaceOptions,
        ) -> Result<Vec<SphereSet>> {
            assert!(options.all_components);
            if probe_radius > 2.5 {
                return Err(SubpocketError::surface(probe_radius, "no boundary"));
            }
            let centers: Vec<[f64; 3]> = spheres.xyz();
            let shell = SphereSet::from_xyz(&centers, Some(probe_radius))?
                .with_mesh(BoundaryMesh::volume_only(probe_radius));
            Ok(vec![shell])
        }
    }

    #[test]
    fn results_follow_requested_order() {
        let input = SphereSet::from_xyz(&[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0]], Some(1.0)).unwrap();
        let radii = [2.0, 1.5, 3.0, 1.0];
        let results = SurfaceSweep::new(SurfaceOptions::all_components())
            .with_workers(Some(2))
            .run(&ShellBackend, &input, &radii)
            .unwrap();

        let order: Vec<f64> = results.iter().map(|r| r.probe_radius).collect();
        assert_eq!(order, radii.to_vec());
        assert!(results[2].result.is_err());
        for surface in [&results[0], &results[1], &results[3]] {
            let sets = surface.result.as_ref().unwrap();
            assert_eq!(sets[0].radii(), vec![surface.probe_radius; 2]);
        }
    }

    #[test]
    fn failure_is_scoped_to_its_radius() {
        let input = SphereSet::from_xyz(&[[0.0, 0.0, 0.0]], Some(1.0)).unwrap();
        let results = SurfaceSweep::new(SurfaceOptions::all_components())
            .run(&ShellBackend, &input, &[3.0, 2.0])
            .unwrap();
        let err = results[0].result.as_ref().unwrap_err();
        assert!(err.is_per_radius());
        assert!(results[1].result.is_ok());
    }
}
