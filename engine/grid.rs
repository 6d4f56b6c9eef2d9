use crate::config::BinningConfig;

/// Log-spaced multipole bins: centres and widths, strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularGrid {
    ell: Vec<f64>,
    dell: Vec<f64>,
}

impl AngularGrid {
    /// `ncl` logarithmic bins between `lmin` and `lmax`. Each centre sits at the
    /// geometric midpoint of its bin and the width is the linear span of the bin.
    pub fn log_spaced(ncl: usize, lmin: f64, lmax: f64) -> Self {
        let log_min = lmin.ln();
        let log_step = (lmax.ln() - log_min) / ncl as f64;
        let ell = (0..ncl)
            .map(|i| (log_min + (i as f64 + 0.5) * log_step).exp())
            .collect();
        let dell = (0..ncl)
            .map(|i| {
                (log_min + (i as f64 + 1.0) * log_step).exp()
                    - (log_min + i as f64 * log_step).exp()
            })
            .collect();
        Self { ell, dell }
    }

    /// The bins of `self` whose centre lies strictly above `threshold`, in order.
    pub fn above(&self, threshold: f64) -> Self {
        let (ell, dell) = self
            .ell
            .iter()
            .zip(&self.dell)
            .filter(|(l, _)| **l > threshold)
            .map(|(l, d)| (*l, *d))
            .unzip();
        Self { ell, dell }
    }

    pub fn len(&self) -> usize {
        self.ell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ell.is_empty()
    }

    pub fn ell(&self, i: usize) -> f64 {
        self.ell[i]
    }

    pub fn dell(&self, i: usize) -> f64 {
        self.dell[i]
    }

    pub fn centres(&self) -> &[f64] {
        &self.ell
    }

    pub fn widths(&self) -> &[f64] {
        &self.dell
    }
}

/// The continuous-probe grid and the cluster-lensing grid derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct AngularGrids {
    pub continuous: AngularGrid,
    /// Bins above `lmax_shear`; its length is the cluster-lensing `lbin` count.
    pub cluster: AngularGrid,
}

impl AngularGrids {
    pub fn from_binning(binning: &BinningConfig) -> Self {
        let continuous = AngularGrid::log_spaced(binning.ncl, binning.lmin, binning.lmax);
        let cluster = continuous.above(binning.lmax_shear);
        Self {
            continuous,
            cluster,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_grid_is_increasing_and_spans_the_range() {
        let grid = AngularGrid::log_spaced(20, 20.0, 15000.0);
        assert_eq!(grid.len(), 20);
        assert!(grid.centres().windows(2).all(|w| w[0] < w[1]));
        let total: f64 = grid.widths().iter().sum();
        assert!((total - (15000.0 - 20.0)).abs() < 1e-8);
        assert!(grid.ell(0) > 20.0 && grid.ell(19) < 15000.0);
    }

    #[test]
    fn widths_match_log_edges() {
        let grid = AngularGrid::log_spaced(4, 10.0, 10000.0);
        // Edges are 10, 56.23, 316.2, 1778, 10000.
        let edges: Vec<f64> = (0..=4).map(|i| 10f64 * 10f64.powf(0.75 * i as f64)).collect();
        for i in 0..4 {
            assert!((grid.dell(i) - (edges[i + 1] - edges[i])).abs() < 1e-9);
            assert!((grid.ell(i) - (edges[i] * edges[i + 1]).sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn cluster_grid_keeps_bins_above_shear_cut() {
        let grids = AngularGrids::from_binning(&BinningConfig::default());
        assert_eq!(grids.cluster.len(), 5);
        assert_eq!(grids.cluster.ell(0), grids.continuous.ell(15));
        assert_eq!(grids.cluster.dell(4), grids.continuous.dell(19));
        assert!(grids.cluster.centres().iter().all(|&l| l > 3000.0));
    }
}
