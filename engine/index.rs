use crate::bins::TomographicBins;
use crate::types::ProbeFamily;

/// Position of one data-vector element inside its family's sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementCoord {
    pub family: ProbeFamily,
    /// Tomographic spectrum index (cluster redshift bin for cluster counts).
    pub tomo: usize,
    /// Multipole bin, or richness bin for cluster probes.
    pub bin: usize,
    /// Cluster-lensing multipole bin.
    pub lbin: Option<usize>,
}

/// The single source of truth for row/column placement in the full covariance.
///
/// Families occupy contiguous sub-ranges in [`ProbeFamily::ALL`] order:
///
/// | family           | size                          |
/// |------------------|-------------------------------|
/// | shear            | spectra x Ncl                 |
/// | ggl              | spectra x Ncl                 |
/// | clustering       | spectra x Ncl                 |
/// | cluster counts   | z-bins x richness bins        |
/// | cluster lensing  | spectra x richness bins x lbin |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    ncl: usize,
    richness_bins: usize,
    lbin: usize,
    counts: [usize; 5],
    offsets: [usize; 5],
    total: usize,
}

impl IndexMap {
    pub fn new(bins: &TomographicBins, ncl: usize, lbin: usize) -> Self {
        let mut map = Self {
            ncl,
            richness_bins: bins.richness_bins,
            lbin,
            counts: ProbeFamily::ALL.map(|f| bins.count(f)),
            offsets: [0; 5],
            total: 0,
        };
        let mut running = 0;
        for (slot, family) in ProbeFamily::ALL.into_iter().enumerate() {
            map.offsets[slot] = running;
            running += map.len(family);
        }
        map.total = running;
        map
    }

    /// Dimension of the full covariance matrix.
    pub fn total_dim(&self) -> usize {
        self.total
    }

    pub fn offset(&self, family: ProbeFamily) -> usize {
        self.offsets[family as usize]
    }

    /// Number of data-vector elements belonging to `family`.
    pub fn len(&self, family: ProbeFamily) -> usize {
        let spectra = self.counts[family as usize];
        match family {
            ProbeFamily::Shear | ProbeFamily::Ggl | ProbeFamily::Clustering => spectra * self.ncl,
            ProbeFamily::ClusterCounts => spectra * self.richness_bins,
            ProbeFamily::ClusterLensing => spectra * self.richness_bins * self.lbin,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn index(&self, coord: ElementCoord) -> usize {
        let ElementCoord {
            family,
            tomo,
            bin,
            lbin,
        } = coord;
        let spectra = self.counts[family as usize];
        assert!(
            tomo < spectra,
            "{family} tomographic index {tomo} out of range (have {spectra})"
        );
        let local = match family {
            ProbeFamily::Shear | ProbeFamily::Ggl | ProbeFamily::Clustering => {
                assert!(bin < self.ncl, "multipole bin {bin} out of range (Ncl = {})", self.ncl);
                tomo * self.ncl + bin
            }
            ProbeFamily::ClusterCounts => {
                assert!(bin < self.richness_bins, "richness bin {bin} out of range");
                tomo * self.richness_bins + bin
            }
            ProbeFamily::ClusterLensing => {
                assert!(bin < self.richness_bins, "richness bin {bin} out of range");
                let l = lbin.unwrap_or_else(|| panic!("{family} requires a multipole bin"));
                assert!(l < self.lbin, "cluster multipole bin {l} out of range (lbin = {})", self.lbin);
                (tomo * self.richness_bins + bin) * self.lbin + l
            }
        };
        self.offset(family) + local
    }

    pub fn shear(&self, spectrum: usize, ell_bin: usize) -> usize {
        self.continuous(ProbeFamily::Shear, spectrum, ell_bin)
    }

    pub fn ggl(&self, spectrum: usize, ell_bin: usize) -> usize {
        self.continuous(ProbeFamily::Ggl, spectrum, ell_bin)
    }

    pub fn clustering(&self, spectrum: usize, ell_bin: usize) -> usize {
        self.continuous(ProbeFamily::Clustering, spectrum, ell_bin)
    }

    pub fn cluster_counts(&self, cluster_z: usize, richness: usize) -> usize {
        self.index(ElementCoord {
            family: ProbeFamily::ClusterCounts,
            tomo: cluster_z,
            bin: richness,
            lbin: None,
        })
    }

    pub fn cluster_lensing(&self, spectrum: usize, richness: usize, ell_bin: usize) -> usize {
        self.index(ElementCoord {
            family: ProbeFamily::ClusterLensing,
            tomo: spectrum,
            bin: richness,
            lbin: Some(ell_bin),
        })
    }

    /// Inverse of [`IndexMap::index`]; `None` past the end of the matrix.
    pub fn coord(&self, index: usize) -> Option<ElementCoord> {
        let family = ProbeFamily::ALL
            .into_iter()
            .rev()
            .find(|&f| index >= self.offset(f) && self.len(f) > 0)?;
        let local = index - self.offset(family);
        if local >= self.len(family) {
            return None;
        }
        Some(match family {
            ProbeFamily::Shear | ProbeFamily::Ggl | ProbeFamily::Clustering => ElementCoord {
                family,
                tomo: local / self.ncl,
                bin: local % self.ncl,
                lbin: None,
            },
            ProbeFamily::ClusterCounts => ElementCoord {
                family,
                tomo: local / self.richness_bins,
                bin: local % self.richness_bins,
                lbin: None,
            },
            ProbeFamily::ClusterLensing => {
                let per_spectrum = self.richness_bins * self.lbin;
                ElementCoord {
                    family,
                    tomo: local / per_spectrum,
                    bin: (local % per_spectrum) / self.lbin,
                    lbin: Some(local % self.lbin),
                }
            }
        })
    }

    fn continuous(&self, family: ProbeFamily, spectrum: usize, ell_bin: usize) -> usize {
        self.index(ElementCoord {
            family,
            tomo: spectrum,
            bin: ell_bin,
            lbin: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bins::RedshiftBins;

    fn map() -> IndexMap {
        let bins = TomographicBins::new(
            RedshiftBins::from_edges(vec![0.0, 0.5, 1.0, 3.0]),
            RedshiftBins::from_edges(vec![0.1, 0.3, 0.5, 0.9]),
            RedshiftBins::from_edges(vec![0.2, 0.4, 0.6]),
            3,
        );
        // shear 6, ggl 5, clustering 3, cluster z 2, cluster lensing 3 spectra
        IndexMap::new(&bins, 4, 2)
    }

    #[test]
    fn offsets_are_cumulative() {
        let m = map();
        assert_eq!(m.offset(ProbeFamily::Shear), 0);
        assert_eq!(m.offset(ProbeFamily::Ggl), 24);
        assert_eq!(m.offset(ProbeFamily::Clustering), 44);
        assert_eq!(m.offset(ProbeFamily::ClusterCounts), 56);
        assert_eq!(m.offset(ProbeFamily::ClusterLensing), 62);
        assert_eq!(m.total_dim(), 62 + 3 * 3 * 2);
    }

    #[test]
    fn map_is_a_bijection_onto_the_matrix() {
        let m = map();
        let mut seen = vec![false; m.total_dim()];
        for family in ProbeFamily::ALL {
            for local in 0..m.len(family) {
                let index = m.offset(family) + local;
                let coord = m.coord(index).unwrap();
                assert_eq!(coord.family, family);
                assert_eq!(m.index(coord), index);
                assert!(!seen[index]);
                seen[index] = true;
            }
        }
        assert!(seen.into_iter().all(|s| s));
        assert_eq!(m.coord(m.total_dim()), None);
    }

    #[test]
    fn cluster_lensing_layout_is_spectrum_richness_multipole() {
        let m = map();
        assert_eq!(m.cluster_lensing(0, 0, 0), 62);
        assert_eq!(m.cluster_lensing(0, 0, 1), 63);
        assert_eq!(m.cluster_lensing(0, 1, 0), 64);
        assert_eq!(m.cluster_lensing(1, 0, 0), 62 + 6);
        assert_eq!(m.cluster_counts(1, 2), 56 + 5);
        assert_eq!(m.ggl(1, 3), 24 + 7);
    }

    #[test]
    #[should_panic(expected = "multipole bin 4 out of range")]
    fn out_of_range_multipole_is_fatal() {
        map().shear(0, 4);
    }
}
