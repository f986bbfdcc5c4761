use crate::error::{DevcastError, Result};

/// Energy-grid lookup strategy. All three share the interpolation
/// formula; they differ in how the bracketing grid points are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    /// Binary search each nuclide's own grid per lookup.
    Nuclide,
    /// One binary search on a unionized grid, then direct index loads.
    Unionized,
    /// Hash the energy into a bin bounding the final search range.
    Hash,
}

impl std::fmt::Display for GridKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridKind::Nuclide => f.write_str("nuclide"),
            GridKind::Unionized => f.write_str("unionized"),
            GridKind::Hash => f.write_str("hash"),
        }
    }
}

impl std::str::FromStr for GridKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nuclide" => Ok(GridKind::Nuclide),
            "unionized" => Ok(GridKind::Unionized),
            "hash" => Ok(GridKind::Hash),
            other => Err(format!(
                "unknown lookup method '{other}' (expected nuclide, unionized or hash)"
            )),
        }
    }
}

/// Immutable simulation configuration, shared read-only by all devices.
#[derive(Debug, Clone, Copy)]
pub struct SimInput {
    /// Cross-section lookups per device.
    pub lookups: usize,
    /// Number of nuclides in the simulation.
    pub n_isotopes: usize,
    /// Grid points per nuclide.
    pub n_gridpoints: usize,
    /// Lookup strategy.
    pub grid: GridKind,
    /// Bin count for [`GridKind::Hash`].
    pub hash_bins: usize,
}

impl SimInput {
    /// Reject table dimensions the lookup kernel cannot bracket.
    ///
    /// Interpolation needs two grid points per nuclide, every material
    /// needs at least one nuclide to draw from, and the hash strategy
    /// needs at least one bin.
    pub fn validate(&self) -> Result<()> {
        if self.n_isotopes == 0 {
            return Err(DevcastError::InvalidSimInput {
                reason: "at least one isotope is required".into(),
            });
        }
        if self.n_gridpoints < 2 {
            return Err(DevcastError::InvalidSimInput {
                reason: format!(
                    "{} grid point(s) per nuclide; interpolation needs at least 2",
                    self.n_gridpoints
                ),
            });
        }
        if self.grid == GridKind::Hash && self.hash_bins == 0 {
            return Err(DevcastError::InvalidSimInput {
                reason: "hash lookup needs at least one bin".into(),
            });
        }
        Ok(())
    }
}

impl Default for SimInput {
    fn default() -> Self {
        Self {
            lookups: 100_000,
            n_isotopes: 68,
            n_gridpoints: 1_000,
            grid: GridKind::Unionized,
            hash_bins: 10_000,
        }
    }
}
