//! Clustering engine
//!
//! Stages run in place on one [`SphereSet`](crate::spheres::SphereSet), in
//! this order within a subpocket run:
//!
//! 1. [`HierarchicalPartitioner`] sweeps the sampling radii from large to
//!    small, clustering ([`cluster_within_radius`]) and propagating
//!    ([`propagate_between_radii`]) group ids, then cleans up with the
//!    [`AdjacencyMerger`].
//! 2. [`OverlapResolver`] pushes apart spheres of different groups.
//! 3. [`remove_interior`] drops swallowed spheres.
//! 4. [`extract_groups`] splits the result into one set per group.

pub mod extract;
pub mod hierarchy;
pub mod interior;
pub mod merge;
pub mod overlap;
pub mod propagate;
pub mod within_radius;

pub use extract::{extract_groups, ExtractOptions, GroupNaming};
pub use hierarchy::{HierarchicalPartitioner, PartitionParams, PartitionReport};
pub use interior::{remove_included_spheres, remove_interior};
pub use merge::{identify_closest_grouped, AdjacencyMerger, Linkage, MergeReport};
pub use overlap::{OverlapParams, OverlapReport, OverlapResolver};
pub use propagate::propagate_between_radii;
pub use within_radius::cluster_within_radius;
