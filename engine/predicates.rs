//! Validity gates applied before any kernel is evaluated.
//!
//! A gated-out element is still written, with zero in the affected columns, so
//! the sparsity pattern of every block file is independent of the cuts.

use crate::bins::RedshiftBins;
use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Redshift ordering test: every galaxy of `source` bin `s` lies behind bin `front`
/// of the foreground sample.
pub fn source_behind(
    foreground: &RedshiftBins,
    front: usize,
    source: &RedshiftBins,
    s: usize,
) -> bool {
    foreground.zmax(front) <= source.zmin(s)
}

/// Relative agreement of two multipoles taken from different grids.
pub fn multipoles_match(ell_a: f64, ell_b: f64, tolerance: f64) -> bool {
    (ell_a / ell_b - 1.0).abs() < tolerance
}

/// Per-lens-bin upper multipole for which the linear bias model holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleCut {
    cutoffs: Vec<f64>,
}

impl ScaleCut {
    /// `ell` passes in bin `b` when `(ell + 1/2) / chi_b < 2 pi / rmin`, with `chi_b`
    /// the comoving distance (Mpc/h) to the bin's mean redshift.
    pub fn from_bias_scale(rmin_bias: f64, comoving_distances: &[f64]) -> Self {
        let kmax = TAU / rmin_bias;
        let cutoffs = comoving_distances.iter().map(|chi| kmax * chi - 0.5).collect();
        Self { cutoffs }
    }

    pub fn from_cutoffs(cutoffs: Vec<f64>) -> Self {
        Self { cutoffs }
    }

    pub fn passes(&self, ell: f64, bin: usize) -> bool {
        ell < self.cutoffs[bin]
    }

    pub fn cutoff(&self, bin: usize) -> f64 {
        self.cutoffs[bin]
    }
}

/// Relative tolerances used when a continuous multipole is matched against a
/// cluster-lensing multipole for the Gaussian term.
///
/// The production writers use 0.1% for shear but 10% for ggl and clustering. The
/// values are kept as they are; they are named here so the discrepancy is visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiagonalTolerances {
    pub shear_cluster_lensing: f64,
    pub ggl_cluster_lensing: f64,
    pub clustering_cluster_lensing: f64,
}

impl Default for DiagonalTolerances {
    fn default() -> Self {
        Self {
            shear_cluster_lensing: 0.001,
            ggl_cluster_lensing: 0.1,
            clustering_cluster_lensing: 0.1,
        }
    }
}

impl DiagonalTolerances {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("shear_cluster_lensing", self.shear_cluster_lensing),
            ("ggl_cluster_lensing", self.ggl_cluster_lensing),
            ("clustering_cluster_lensing", self.clustering_cluster_lensing),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidTolerance { name, value });
            }
        }
        if self.shear_cluster_lensing != self.ggl_cluster_lensing
            || self.ggl_cluster_lensing != self.clustering_cluster_lensing
        {
            log::debug!(
                "cluster-lensing diagonal tolerances differ between families: shear={} ggl={} clustering={}",
                self.shear_cluster_lensing,
                self.ggl_cluster_lensing,
                self.clustering_cluster_lensing
            );
        }
        Ok(())
    }
}
