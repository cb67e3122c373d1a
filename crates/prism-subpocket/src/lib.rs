//! PRISM subpocket partitioning
//!
//! Divides the interior sphere cloud of a binding pocket into subpockets by
//! clustering spheres across a descending sweep of probe radii, separating
//! overlapping groups and ranking the result by enclosed volume.
//!
//! Boundary-surface triangulation is delegated to a
//! [`SurfaceBackend`](surface::SurfaceBackend) supplied by the caller.

pub mod cluster;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod spatial;
pub mod spheres;
pub mod surface;

pub use cluster::{
    extract_groups, remove_included_spheres, remove_interior, AdjacencyMerger, ExtractOptions,
    GroupNaming, HierarchicalPartitioner, OverlapParams, OverlapReport, OverlapResolver,
    PartitionParams, PartitionReport,
};
pub use config::{OverlapConfig, SubpocketConfig};
pub use errors::{ConvergenceStage, ConvergenceWarning, Result, SubpocketError};
pub use pipeline::{exterior_spheres, SubpocketOutcome, SubpocketPipeline};
pub use spheres::{merge_sphere_list, BoundaryMesh, Group, Sphere, SphereSet};
pub use surface::{RadiusSurface, SurfaceBackend, SurfaceOptions, SurfaceSweep};
