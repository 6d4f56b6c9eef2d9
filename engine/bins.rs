//! Tomographic bin sets and the index algebra mapping a linear power-spectrum index
//! back to the single-sample bins it combines.
//!
//! Every block writer resolves bin identities through [`TomographicBins`]; nothing
//! else enumerates bin pairs, so the `ggl` block and the `ggl x shear` block always
//! agree on what spectrum `n` means.

use crate::predicates::source_behind;
use crate::types::{ProbeFamily, Spectrum};

/// Contiguous redshift slices given by their edges.
#[derive(Debug, Clone, PartialEq)]
pub struct RedshiftBins {
    edges: Vec<f64>,
}

impl RedshiftBins {
    pub fn from_edges(edges: Vec<f64>) -> Self {
        Self { edges }
    }

    pub fn len(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn zmin(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    pub fn zmax(&self, bin: usize) -> f64 {
        self.edges[bin + 1]
    }

    pub fn zmean(&self, bin: usize) -> f64 {
        0.5 * (self.zmin(bin) + self.zmax(bin))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TomographicBins {
    pub source: RedshiftBins,
    pub lens: RedshiftBins,
    pub cluster: RedshiftBins,
    pub richness_bins: usize,
    shear: Vec<(usize, usize)>,
    ggl: Vec<(usize, usize)>,
    cluster_lensing: Vec<(usize, usize)>,
}

impl TomographicBins {
    pub fn new(
        source: RedshiftBins,
        lens: RedshiftBins,
        cluster: RedshiftBins,
        richness_bins: usize,
    ) -> Self {
        let shear = (0..source.len())
            .flat_map(|i| (i..source.len()).map(move |j| (i, j)))
            .collect();
        let ggl = (0..lens.len())
            .flat_map(|l| (0..source.len()).map(move |s| (l, s)))
            .filter(|&(l, s)| source_behind(&lens, l, &source, s))
            .collect();
        let cluster_lensing = (0..cluster.len())
            .flat_map(|c| (0..source.len()).map(move |s| (c, s)))
            .filter(|&(c, s)| source_behind(&cluster, c, &source, s))
            .collect();
        Self {
            source,
            lens,
            cluster,
            richness_bins,
            shear,
            ggl,
            cluster_lensing,
        }
    }

    /// Number of tomographic spectra (or cluster redshift bins) in `family`.
    pub fn count(&self, family: ProbeFamily) -> usize {
        match family {
            ProbeFamily::Shear => self.shear.len(),
            ProbeFamily::Ggl => self.ggl.len(),
            ProbeFamily::Clustering => self.lens.len(),
            ProbeFamily::ClusterCounts => self.cluster.len(),
            ProbeFamily::ClusterLensing => self.cluster_lensing.len(),
        }
    }

    /// Source bins `(z1, z2)` of shear spectrum `n`.
    pub fn shear_pair(&self, n: usize) -> (usize, usize) {
        lookup(&self.shear, n, ProbeFamily::Shear)
    }

    /// `(lens, source)` of ggl spectrum `n`.
    pub fn ggl_pair(&self, n: usize) -> (usize, usize) {
        lookup(&self.ggl, n, ProbeFamily::Ggl)
    }

    /// `(cluster redshift bin, source)` of cluster-lensing spectrum `n`.
    pub fn cluster_lensing_pair(&self, n: usize) -> (usize, usize) {
        lookup(&self.cluster_lensing, n, ProbeFamily::ClusterLensing)
    }

    /// Clustering spectra are lens auto-correlations, so the index is the lens bin.
    pub fn clustering_bin(&self, n: usize) -> usize {
        assert!(
            n < self.lens.len(),
            "{} spectrum index {n} out of range (have {})",
            ProbeFamily::Clustering,
            self.lens.len()
        );
        n
    }

    pub fn shear_spectrum(&self, n: usize) -> Spectrum {
        let (z1, z2) = self.shear_pair(n);
        Spectrum::Shear { z1, z2 }
    }

    pub fn ggl_spectrum(&self, n: usize) -> Spectrum {
        let (lens, source) = self.ggl_pair(n);
        Spectrum::Ggl { lens, source }
    }

    pub fn clustering_spectrum(&self, n: usize) -> Spectrum {
        Spectrum::Clustering {
            lens: self.clustering_bin(n),
        }
    }
}

fn lookup(pairs: &[(usize, usize)], n: usize, family: ProbeFamily) -> (usize, usize) {
    match pairs.get(n) {
        Some(&pair) => pair,
        None => panic!(
            "{family} spectrum index {n} out of range (have {})",
            pairs.len()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bins() -> TomographicBins {
        TomographicBins::new(
            RedshiftBins::from_edges(vec![0.0, 0.5, 1.0, 3.0]),
            RedshiftBins::from_edges(vec![0.1, 0.3, 0.5, 0.9]),
            RedshiftBins::from_edges(vec![0.2, 0.4, 0.6]),
            3,
        )
    }

    #[test]
    fn shear_pairs_are_upper_triangle_row_major() {
        let b = bins();
        assert_eq!(b.count(ProbeFamily::Shear), 6);
        let pairs: Vec<_> = (0..6).map(|n| b.shear_pair(n)).collect();
        assert_eq!(pairs, vec![(0, 0), (0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn ggl_pairs_keep_only_sources_behind_lenses() {
        let b = bins();
        // lens 0 (0.1-0.3): sources 1, 2; lens 1 (0.3-0.5): sources 1, 2; lens 2 (0.5-0.9): source 2.
        let pairs: Vec<_> = (0..b.count(ProbeFamily::Ggl)).map(|n| b.ggl_pair(n)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn cluster_lensing_pairs_and_counts() {
        let b = bins();
        let pairs: Vec<_> = (0..b.count(ProbeFamily::ClusterLensing))
            .map(|n| b.cluster_lensing_pair(n))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(b.count(ProbeFamily::ClusterCounts), 2);
        assert_eq!(b.count(ProbeFamily::Clustering), 3);
    }

    #[test]
    fn spectra_carry_resolved_bins() {
        let b = bins();
        assert_eq!(b.shear_spectrum(4), Spectrum::Shear { z1: 1, z2: 2 });
        assert_eq!(b.ggl_spectrum(2), Spectrum::Ggl { lens: 1, source: 1 });
        assert_eq!(b.clustering_spectrum(2), Spectrum::Clustering { lens: 2 });
    }

    #[test]
    #[should_panic(expected = "galaxy-galaxy lensing spectrum index 5 out of range")]
    fn out_of_range_index_is_fatal() {
        bins().ggl_pair(5);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_clustering_is_fatal() {
        bins().clustering_bin(3);
    }
}
