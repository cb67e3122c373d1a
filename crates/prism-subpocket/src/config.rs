//! Subpocket configuration
//!
//! Serde-based TOML configuration for the subpocket pipeline. Every field
//! has a default, so an empty file is a valid configuration.
//!
//! # Example TOML
//! ```toml
//! min_rad = 1.4
//! max_rad = 3.4
//! min_subpocket_rad = 1.7
//! radial_sampling = 0.1
//! min_cluster_size = 5
//! max_clusters = 50
//! prefix = "lig"
//!
//! [overlap]
//! iterations = 20
//! tolerance = 0.02
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cluster::{OverlapParams, PartitionParams};
use crate::errors::{Result, SubpocketError};

/// Bounds applied to `min_rad` when `constrain_radii` is set
pub const MIN_RAD_BOUNDS: (f64, f64) = (1.2, 2.0);
/// Bounds applied to `max_rad` when `constrain_radii` is set
pub const MAX_RAD_BOUNDS: (f64, f64) = (2.0, 5.0);
/// Upper limit on the number of probe radii in one sweep
pub const MAX_SAMPLED_RADII: usize = 1000;

/// Root configuration for subpocket partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubpocketConfig {
    /// Smallest probe radius (Å)
    #[serde(default = "default_min_rad")]
    pub min_rad: f64,

    /// Bulk-solvent probe radius (Å)
    #[serde(default = "default_max_rad")]
    pub max_rad: f64,

    /// Clamp `min_rad` and `max_rad` into their recommended ranges
    #[serde(default)]
    pub constrain_radii: bool,

    /// Smallest radius at which a new subpocket may be seeded (Å)
    #[serde(default = "default_min_subpocket_rad")]
    pub min_subpocket_rad: f64,

    /// Upper (exclusive) bound of the sampling sweep (Å)
    #[serde(default = "default_max_subpocket_rad")]
    pub max_subpocket_rad: f64,

    /// Probe radius of the per-subpocket boundary surfaces (Å)
    #[serde(default = "default_min_subpocket_surf_rad")]
    pub min_subpocket_surf_rad: f64,

    /// Step between sampling radii (Å)
    #[serde(default = "default_radial_sampling")]
    pub radial_sampling: f64,

    /// Extra distance added when selecting spheres near the pocket (Å)
    #[serde(default = "default_inclusion_radius_buffer")]
    pub inclusion_radius_buffer: f64,

    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,

    /// Maximum number of subpockets; omit for the default of 50
    #[serde(default = "default_max_clusters")]
    pub max_clusters: Option<usize>,

    /// Surface sweep workers (defaults to available parallelism)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Name prefix for extracted subpockets
    #[serde(default)]
    pub prefix: Option<String>,

    #[serde(default)]
    pub overlap: OverlapConfig,
}

impl Default for SubpocketConfig {
    fn default() -> Self {
        Self {
            min_rad: default_min_rad(),
            max_rad: default_max_rad(),
            constrain_radii: false,
            min_subpocket_rad: default_min_subpocket_rad(),
            max_subpocket_rad: default_max_subpocket_rad(),
            min_subpocket_surf_rad: default_min_subpocket_surf_rad(),
            radial_sampling: default_radial_sampling(),
            inclusion_radius_buffer: default_inclusion_radius_buffer(),
            min_cluster_size: default_min_cluster_size(),
            max_clusters: default_max_clusters(),
            workers: None,
            prefix: None,
            overlap: OverlapConfig::default(),
        }
    }
}

impl SubpocketConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Validate value ranges and radius ordering.
    pub fn validate(&self) -> Result<()> {
        let radii = [
            ("min_rad", self.min_rad),
            ("max_rad", self.max_rad),
            ("min_subpocket_rad", self.min_subpocket_rad),
            ("max_subpocket_rad", self.max_subpocket_rad),
            ("min_subpocket_surf_rad", self.min_subpocket_surf_rad),
            ("radial_sampling", self.radial_sampling),
        ];
        for (name, value) in radii {
            if !value.is_finite() || value <= 0.0 {
                return Err(SubpocketError::config(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        if !self.inclusion_radius_buffer.is_finite() || self.inclusion_radius_buffer < 0.0 {
            return Err(SubpocketError::config(format!(
                "inclusion_radius_buffer must be non-negative, got {}",
                self.inclusion_radius_buffer
            )));
        }
        if self.min_rad >= self.max_rad {
            return Err(SubpocketError::config(format!(
                "min_rad ({}) must be smaller than max_rad ({})",
                self.min_rad, self.max_rad
            )));
        }
        if self.min_subpocket_rad > self.max_subpocket_rad {
            return Err(SubpocketError::config(format!(
                "min_subpocket_rad ({}) must not exceed max_subpocket_rad ({})",
                self.min_subpocket_rad, self.max_subpocket_rad
            )));
        }
        if self.max_subpocket_rad <= self.min_rad {
            return Err(SubpocketError::config(format!(
                "max_subpocket_rad ({}) must exceed min_rad ({}) to sample any radius",
                self.max_subpocket_rad, self.min_rad
            )));
        }
        let steps = self.sampling_steps();
        if steps > MAX_SAMPLED_RADII {
            return Err(SubpocketError::config(format!(
                "radial_sampling {} yields {} probe radii between {} and {} (limit {})",
                self.radial_sampling, steps, self.min_rad, self.max_subpocket_rad, MAX_SAMPLED_RADII
            )));
        }
        if let Some(max_clusters) = self.max_clusters {
            if max_clusters < 2 {
                return Err(SubpocketError::config(format!(
                    "max_clusters must be at least 2, got {}",
                    max_clusters
                )));
            }
        }
        if self.workers == Some(0) {
            return Err(SubpocketError::config("workers must be at least 1"));
        }
        self.overlap.validate()
    }

    /// Copy with `min_rad` and `max_rad` clamped when `constrain_radii` is set
    pub fn constrained(&self) -> Self {
        let mut config = self.clone();
        if !self.constrain_radii {
            return config;
        }

        let min_rad = self.min_rad.clamp(MIN_RAD_BOUNDS.0, MIN_RAD_BOUNDS.1);
        if min_rad != self.min_rad {
            log::info!("Minimum radius constrained from {} to {}", self.min_rad, min_rad);
            config.min_rad = min_rad;
        }
        let max_rad = self.max_rad.clamp(MAX_RAD_BOUNDS.0, MAX_RAD_BOUNDS.1);
        if max_rad != self.max_rad {
            log::info!("Maximum radius constrained from {} to {}", self.max_rad, max_rad);
            config.max_rad = max_rad;
        }
        config
    }

    /// Descending probe radii `min_rad + k * radial_sampling` below
    /// `max_subpocket_rad`
    ///
    /// Values are rounded to 1e-9 Å so every stage sees bit-identical radii.
    /// Empty when the sampling is invalid or exceeds [`MAX_SAMPLED_RADII`].
    pub fn sampling_radii(&self) -> Vec<f64> {
        let steps = self.sampling_steps();
        if steps > MAX_SAMPLED_RADII {
            return Vec::new();
        }
        let mut radii: Vec<f64> = (0..steps)
            .map(|k| ((self.min_rad + k as f64 * self.radial_sampling) * 1e9).round() / 1e9)
            .take_while(|&value| value < self.max_subpocket_rad - 1e-9)
            .collect();
        radii.reverse();
        radii
    }

    /// Upper bound on the sweep length, saturating for degenerate spacing
    fn sampling_steps(&self) -> usize {
        let finite = [self.radial_sampling, self.min_rad, self.max_subpocket_rad]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.radial_sampling <= 0.0 {
            return 0;
        }
        let span = self.max_subpocket_rad - self.min_rad;
        if span <= 0.0 {
            return 0;
        }
        // float -> usize casts saturate
        (span / self.radial_sampling).ceil() as usize + 1
    }

    /// Radius around the pocket within which exterior spheres matter
    pub fn nonextraneous_radius(&self) -> f64 {
        self.min_rad + self.max_rad + self.inclusion_radius_buffer
    }

    pub fn partition_params(&self) -> PartitionParams {
        PartitionParams::new(self.sampling_radii())
            .with_min_new_radius(self.min_subpocket_rad)
            .with_min_cluster_size(self.min_cluster_size)
            .with_max_clusters(self.max_clusters)
    }

    /// Overlap parameters for the banded pass over the sampling radii
    pub fn banded_overlap_params(&self) -> OverlapParams {
        OverlapParams {
            radii: Some(self.sampling_radii()),
            spacing: self.radial_sampling,
            ..self.overlap.params()
        }
    }
}

// =============================================================================
// Overlap Configuration
// =============================================================================

/// Relaxation settings shared by both overlap passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Iteration cap per (radius band, group)
    #[serde(default = "default_overlap_iterations")]
    pub iterations: usize,

    /// Overlap tolerated without correction (Å)
    #[serde(default = "default_overlap_tolerance")]
    pub tolerance: f64,

    /// Keep the highest group fixed while the others move
    #[serde(default)]
    pub static_last_group: bool,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            iterations: default_overlap_iterations(),
            tolerance: default_overlap_tolerance(),
            static_last_group: false,
        }
    }
}

impl OverlapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(SubpocketError::config("overlap.iterations must be at least 1"));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(SubpocketError::config(format!(
                "overlap.tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Unbanded parameters (single band below the largest radius)
    pub fn params(&self) -> OverlapParams {
        OverlapParams {
            iterations: self.iterations,
            tolerance: self.tolerance,
            static_last_group: self.static_last_group,
            ..OverlapParams::default()
        }
    }
}

// =============================================================================
// Defaults
// =============================================================================

fn default_min_rad() -> f64 {
    1.4
}

fn default_max_rad() -> f64 {
    3.4
}

fn default_min_subpocket_rad() -> f64 {
    1.7
}

fn default_max_subpocket_rad() -> f64 {
    3.4
}

fn default_min_subpocket_surf_rad() -> f64 {
    1.0
}

fn default_radial_sampling() -> f64 {
    0.1
}

fn default_inclusion_radius_buffer() -> f64 {
    1.0
}

fn default_min_cluster_size() -> usize {
    5
}

fn default_max_clusters() -> Option<usize> {
    Some(50)
}

fn default_overlap_iterations() -> usize {
    20
}

fn default_overlap_tolerance() -> f64 {
    0.02
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_uses_defaults() {
        let config = SubpocketConfig::from_str("").unwrap();
        assert_eq!(config, SubpocketConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_overrides() {
        let config = SubpocketConfig::from_str(
            r#"
            min_rad = 1.6
            prefix = "lig"

            [overlap]
            static_last_group = true
            "#,
        )
        .unwrap();
        assert_eq!(config.min_rad, 1.6);
        assert_eq!(config.prefix.as_deref(), Some("lig"));
        assert!(config.overlap.static_last_group);
        assert_eq!(config.overlap.iterations, 20);
    }

    #[test]
    fn sampling_radii_descend_below_upper_bound() {
        let radii = SubpocketConfig::default().sampling_radii();
        assert_eq!(radii.len(), 20);
        assert_eq!(radii[0], 3.3);
        assert_eq!(radii[19], 1.4);
        assert!(radii.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn dense_sampling_is_rejected_up_front() {
        let config = SubpocketConfig {
            radial_sampling: 1e-12,
            ..SubpocketConfig::default()
        };
        assert!(config.sampling_radii().is_empty());
        assert!(matches!(config.validate(), Err(SubpocketError::ConfigError(_))));

        let fine = SubpocketConfig {
            radial_sampling: 0.01,
            ..SubpocketConfig::default()
        };
        assert!(fine.validate().is_ok());
        assert_eq!(fine.sampling_radii().len(), 200);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = SubpocketConfig {
            max_clusters: Some(1),
            ..SubpocketConfig::default()
        };
        assert!(matches!(config.validate(), Err(SubpocketError::ConfigError(_))));

        let config = SubpocketConfig {
            min_rad: 4.0,
            ..SubpocketConfig::default()
        };
        assert!(config.validate().is_err());

        let mut config = SubpocketConfig::default();
        config.overlap.iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn constraint_clamps_radii() {
        let config = SubpocketConfig {
            min_rad: 0.5,
            max_rad: 8.0,
            constrain_radii: true,
            ..SubpocketConfig::default()
        };
        let clamped = config.constrained();
        assert_eq!(clamped.min_rad, 1.2);
        assert_eq!(clamped.max_rad, 5.0);

        let free = SubpocketConfig {
            constrain_radii: false,
            ..config
        };
        assert_eq!(free.constrained().min_rad, 0.5);
    }

    #[test]
    fn toml_round_trip() {
        let config = SubpocketConfig {
            prefix: Some("pocket".to_string()),
            workers: Some(4),
            ..SubpocketConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(SubpocketConfig::from_str(&text).unwrap(), config);
    }
}
