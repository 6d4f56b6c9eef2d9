// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// Types used by more than one module. Anything local to a single module lives there.

use std::fmt;

/// The five observables whose joint covariance is assembled.
///
/// The declaration order is the order of the sub-ranges in the global matrix index
/// space and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProbeFamily {
    Shear,
    Ggl,
    Clustering,
    ClusterCounts,
    ClusterLensing,
}

impl ProbeFamily {
    pub const ALL: [ProbeFamily; 5] = [
        ProbeFamily::Shear,
        ProbeFamily::Ggl,
        ProbeFamily::Clustering,
        ProbeFamily::ClusterCounts,
        ProbeFamily::ClusterLensing,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            Self::Shear => "cosmic shear",
            Self::Ggl => "galaxy-galaxy lensing",
            Self::Clustering => "galaxy clustering",
            Self::ClusterCounts => "cluster number counts",
            Self::ClusterLensing => "cluster weak lensing",
        }
    }
}

impl fmt::Display for ProbeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// One side of a covariance element: the tomographic (and, for cluster probes,
/// richness) identity of a single data-vector spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Spectrum {
    /// Source-bin pair `(z1, z2)` with `z1 <= z2`.
    Shear { z1: usize, z2: usize },
    Ggl { lens: usize, source: usize },
    /// Lens auto-spectrum.
    Clustering { lens: usize },
    ClusterCounts { cluster_z: usize, richness: usize },
    ClusterLensing {
        cluster_z: usize,
        richness: usize,
        source: usize,
    },
}

impl Spectrum {
    pub fn family(&self) -> ProbeFamily {
        match self {
            Self::Shear { .. } => ProbeFamily::Shear,
            Self::Ggl { .. } => ProbeFamily::Ggl,
            Self::Clustering { .. } => ProbeFamily::Clustering,
            Self::ClusterCounts { .. } => ProbeFamily::ClusterCounts,
            Self::ClusterLensing { .. } => ProbeFamily::ClusterLensing,
        }
    }
}

/// A single record of a block file.
///
/// `ell` holds the multipoles of the row and column elements; count-like probes carry
/// `0.0` on their side. The meaning of the `bins` columns depends on the block kind,
/// `B` is 4 for every enumerated block and 6 for the whole-sector cluster-lensing file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CovarianceEntry<const B: usize = 4> {
    pub row: usize,
    pub col: usize,
    pub ell: [f64; 2],
    pub bins: [usize; B],
    pub gaussian: f64,
    pub non_gaussian: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_order_matches_matrix_layout() {
        let mut sorted = ProbeFamily::ALL;
        sorted.sort();
        assert_eq!(sorted, ProbeFamily::ALL);
        assert_eq!(ProbeFamily::ALL[0], ProbeFamily::Shear);
        assert_eq!(ProbeFamily::ALL[4], ProbeFamily::ClusterLensing);
    }

    #[test]
    fn spectrum_reports_its_family() {
        let s = Spectrum::ClusterLensing {
            cluster_z: 1,
            richness: 2,
            source: 3,
        };
        assert_eq!(s.family(), ProbeFamily::ClusterLensing);
        assert_eq!(Spectrum::Clustering { lens: 0 }.family().to_string(), "galaxy clustering");
    }
}
