//! Boundary-surface collaborator seam
//!
//! Triangulating a solvent-excluded surface is delegated to an external
//! backend. The core only consumes the boundary spheres it produces, the
//! enclosed volume and an opaque mesh.

pub mod sweep;

pub use sweep::{RadiusSurface, SurfaceSweep};

use crate::errors::Result;
use crate::spheres::SphereSet;

/// Options forwarded to a [`SurfaceBackend`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurfaceOptions {
    /// Return every disconnected component instead of only the outer one
    pub all_components: bool,
    /// Keep only the component enclosing the largest volume
    pub largest_only: bool,
    /// Keep only the component closest to this input row
    pub cavity_atom_index: Option<usize>,
    /// Discard components enclosing less than this volume (Å³)
    pub min_volume: Option<f64>,
}

impl SurfaceOptions {
    pub fn all_components() -> Self {
        Self {
            all_components: true,
            ..Self::default()
        }
    }
}

/// External boundary-surface computation
///
/// Each returned set holds the boundary spheres of one surface component at
/// `probe_radius` (centers offset along the surface normals, radius
/// `probe_radius`) with its mesh and enclosed volume populated.
/// Implementations must be safe to call from several sweep workers at once.
pub trait SurfaceBackend: Sync {
    fn compute_surface(
        &self,
        spheres: &SphereSet,
        probe_radius: f64,
        options: &SurfaceOptions,
    ) -> Result<Vec<SphereSet>>;
}

impl<T: SurfaceBackend + ?Sized> SurfaceBackend for &T {
    fn compute_surface(
        &self,
        spheres: &SphereSet,
        probe_radius: f64,
        options: &SurfaceOptions,
    ) -> Result<Vec<SphereSet>> {
        (**self).compute_surface(spheres, probe_radius, options)
    }
}
