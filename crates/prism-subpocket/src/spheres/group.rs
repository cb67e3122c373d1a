//! Three-way group tagging for spheres

use std::cmp::Ordering;
use std::fmt;

use crate::errors::{Result, SubpocketError};

/// Group assignment of a single sphere.
///
/// Ids carried by `Pending` and `Resolved` start at 1. In the 5-column text
/// layout the group is written as a signed label: `0` for ungrouped, `-n`
/// for pending and `n` for resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Group {
    /// Not yet assigned to any cluster
    #[default]
    Ungrouped,
    /// Tentative cluster that must be folded into a resolved one
    Pending(u32),
    /// Proper subpocket cluster
    Resolved(u32),
}

impl Group {
    /// Signed numeric label used for serialization and ordering
    pub fn label(self) -> i64 {
        match self {
            Group::Ungrouped => 0,
            Group::Pending(id) => -i64::from(id),
            Group::Resolved(id) => i64::from(id),
        }
    }

    pub fn as_f64(self) -> f64 {
        self.label() as f64
    }

    /// Parse a signed label; fractional or non-finite labels are rejected.
    pub fn from_label(value: f64) -> Result<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(SubpocketError::input(format!(
                "group label {} is not an integer",
                value
            )));
        }
        if value.abs() > f64::from(u32::MAX) {
            return Err(SubpocketError::input(format!(
                "group label {} is out of range",
                value
            )));
        }
        let magnitude = value.abs() as u32;
        Ok(if value > 0.0 {
            Group::Resolved(magnitude)
        } else if value < 0.0 {
            Group::Pending(magnitude)
        } else {
            Group::Ungrouped
        })
    }

    #[inline]
    pub fn is_resolved(self) -> bool {
        matches!(self, Group::Resolved(_))
    }

    #[inline]
    pub fn is_pending(self) -> bool {
        matches!(self, Group::Pending(_))
    }

    #[inline]
    pub fn is_ungrouped(self) -> bool {
        matches!(self, Group::Ungrouped)
    }

    pub fn resolved_id(self) -> Option<u32> {
        match self {
            Group::Resolved(id) => Some(id),
            _ => None,
        }
    }

    fn rank(self) -> u8 {
        match self {
            Group::Pending(_) => 0,
            Group::Ungrouped => 1,
            Group::Resolved(_) => 2,
        }
    }
}

impl Ord for Group {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label()
            .cmp(&other.label())
            .then(self.rank().cmp(&other.rank()))
    }
}

impl PartialOrd for Group {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
