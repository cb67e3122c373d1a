//! Error types for subpocket partitioning.
//!
//! Clustering and merge stages fail fast through [`SubpocketError`]; the
//! relaxation stages degrade gracefully and report a [`ConvergenceWarning`]
//! alongside their (partial) result instead.

use std::fmt;

use thiserror::Error;

/// Unified error type for all subpocket operations.
#[derive(Error, Debug)]
pub enum SubpocketError {
    /// Malformed sphere arrays, empty mandatory inputs, non-finite values
    #[error("Input error: {0}")]
    InputError(String),

    /// The external boundary-surface collaborator failed for one probe radius
    #[error("Surface computation failed at probe radius {probe_radius}: {message}")]
    SurfaceComputation { probe_radius: f64, message: String },

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Malformed line in a whitespace-delimited sphere table
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Worker pool could not be constructed
    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    /// I/O errors (sphere tables, mesh files, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML deserialization errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("Config write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

impl SubpocketError {
    /// Creates an input error.
    pub fn input(message: impl Into<String>) -> Self {
        SubpocketError::InputError(message.into())
    }

    /// Creates a surface computation error for a probe radius.
    pub fn surface(probe_radius: f64, message: impl Into<String>) -> Self {
        SubpocketError::SurfaceComputation {
            probe_radius,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        SubpocketError::ConfigError(message.into())
    }

    /// Creates a parse error for a 1-based line number.
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        SubpocketError::Parse {
            line,
            message: message.into(),
        }
    }

    /// Surface failures are scoped to one radius and never abort a sweep.
    pub fn is_per_radius(&self) -> bool {
        matches!(self, SubpocketError::SurfaceComputation { .. })
    }

    /// Returns a user-friendly error message with actionable guidance.
    pub fn user_message(&self) -> String {
        match self {
            SubpocketError::InputError(msg) => {
                format!(
                    "Input error: {}\n\
                     → Sphere tables must have 3, 4 or 5 finite columns per row.\n\
                     → Group labels must be integral.",
                    msg
                )
            }
            SubpocketError::SurfaceComputation {
                probe_radius,
                message,
            } => {
                format!(
                    "No boundary could be computed at probe radius {}: {}\n\
                     → Check that the sphere cloud encloses a cavity at this scale.",
                    probe_radius, message
                )
            }
            SubpocketError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n\
                     → Check that min_rad < max_rad and min_subpocket_rad <= max_subpocket_rad.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Result type alias for subpocket operations.
pub type Result<T> = std::result::Result<T, SubpocketError>;

/// Stage that produced a [`ConvergenceWarning`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStage {
    OverlapResolver,
    AdjacencyMerger,
}

impl fmt::Display for ConvergenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverlapResolver => write!(f, "overlap resolver"),
            Self::AdjacencyMerger => write!(f, "adjacency merger"),
        }
    }
}

/// Non-fatal signal that an iterative stage hit its cap before resolving.
///
/// Volumes computed from a partition carrying one of these are approximate.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceWarning {
    pub stage: ConvergenceStage,
    pub iterations: usize,
    /// Largest remaining overlap, or count of still-linkable groups for the merger
    pub residual: f64,
    pub detail: String,
}

impl ConvergenceWarning {
    pub fn new(
        stage: ConvergenceStage,
        iterations: usize,
        residual: f64,
        detail: impl Into<String>,
    ) -> Self {
        let warning = Self {
            stage,
            iterations,
            residual,
            detail: detail.into(),
        };
        log::warn!("{}", warning);
        warning
    }
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stopped after {} iterations (residual {:.4}): {}",
            self.stage, self.iterations, self.residual, self.detail
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let input = SubpocketError::input("4 columns expected");
        assert!(matches!(input, SubpocketError::InputError(_)));

        let surface = SubpocketError::surface(1.4, "degenerate geometry");
        assert!(matches!(surface, SubpocketError::SurfaceComputation { .. }));
        assert!(surface.is_per_radius());

        let config = SubpocketError::config("min_rad >= max_rad");
        assert!(!config.is_per_radius());
    }

    #[test]
    fn test_user_message_mentions_radius() {
        let err = SubpocketError::surface(2.5, "empty mesh");
        assert!(err.user_message().contains("2.5"));
    }

    #[test]
    fn test_warning_display() {
        let warning = ConvergenceWarning::new(
            ConvergenceStage::OverlapResolver,
            20,
            0.1,
            "group 1 against others",
        );
        let text = warning.to_string();
        assert!(text.contains("overlap resolver"));
        assert!(text.contains("20"));
    }
}
