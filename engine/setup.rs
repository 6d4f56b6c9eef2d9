use crate::bins::{RedshiftBins, TomographicBins};
use crate::config::{ConfigError, RunConfig, Survey};
use crate::grid::AngularGrids;
use crate::index::IndexMap;
use crate::predicates::{DiagonalTolerances, ScaleCut};
use crate::theory::Theory;
use std::path::{Path, PathBuf};

/// The immutable per-run context every block writer reads from.
#[derive(Debug, Clone)]
pub struct CovarianceSetup {
    pub survey: Survey,
    pub grids: AngularGrids,
    pub bins: TomographicBins,
    pub index: IndexMap,
    pub scale_cut: ScaleCut,
    pub lmax_shear: f64,
    pub tolerances: DiagonalTolerances,
    pub outdir: PathBuf,
}

impl CovarianceSetup {
    pub fn new<T: Theory + ?Sized>(config: &RunConfig, theory: &T) -> Result<Self, ConfigError> {
        config.validate()?;
        let survey = config.resolved_survey()?;
        let grids = AngularGrids::from_binning(&config.binning);
        let lens = RedshiftBins::from_edges(config.lens_edges()?);
        let distances: Vec<f64> = (0..lens.len())
            .map(|b| theory.comoving_distance(lens.zmean(b)))
            .collect();
        let scale_cut = ScaleCut::from_bias_scale(config.binning.rmin_bias, &distances);
        let bins = TomographicBins::new(
            RedshiftBins::from_edges(config.tomography.source_edges.clone()),
            lens,
            RedshiftBins::from_edges(config.tomography.cluster_edges.clone()),
            config.tomography.richness_bins,
        );
        let index = IndexMap::new(&bins, grids.continuous.len(), grids.cluster.len());
        log::debug!(
            "covariance setup: {} elements, {} cluster multipole bins",
            index.total_dim(),
            grids.cluster.len()
        );
        Ok(Self {
            survey,
            grids,
            bins,
            index,
            scale_cut,
            lmax_shear: config.binning.lmax_shear,
            tolerances: config.tolerances.clone(),
            outdir: config.output.outdir.clone(),
        })
    }

    /// Replaces the bias-scale cuts, e.g. with cutoffs from an external calibration.
    pub fn with_scale_cut(mut self, scale_cut: ScaleCut) -> Self {
        self.scale_cut = scale_cut;
        self
    }

    pub fn with_outdir(mut self, outdir: &Path) -> Self {
        self.outdir = outdir.to_path_buf();
        self
    }

    /// File stem shared by every block of kind `tag`.
    pub fn stem(&self, tag: &str) -> String {
        format!(
            "{}_{}_cov_Ncl{}_Ntomo{}",
            self.survey.name(),
            tag,
            self.grids.continuous.len(),
            self.bins.source.len()
        )
    }

    /// `{outdir}/{stem}_{job_id}`.
    pub fn block_path(&self, tag: &str, job_id: usize) -> PathBuf {
        self.outdir.join(format!("{}_{job_id}", self.stem(tag)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::NoiseOnlyTheory;
    use crate::types::ProbeFamily;

    #[test]
    fn default_setup_dimensions() {
        let config = RunConfig::default();
        let survey = config.resolved_survey().unwrap();
        let theory = NoiseOnlyTheory::for_survey(&survey, 5, 9);
        let setup = CovarianceSetup::new(&config, &theory).unwrap();
        assert_eq!(setup.bins.count(ProbeFamily::Shear), 15);
        assert_eq!(setup.bins.count(ProbeFamily::Clustering), 9);
        assert_eq!(setup.grids.cluster.len(), 5);
        assert_eq!(
            setup.stem("ssss"),
            "LSST_Y6_area1.500000e+04_ng2.350000e+01_nl4.100000e+01_ssss_cov_Ncl20_Ntomo5"
        );
        assert!(setup.block_path("nn", 42).ends_with(format!("{}_42", setup.stem("nn"))));
        // Scale cuts grow with distance, so deeper lens bins keep more multipoles.
        assert!(setup.scale_cut.cutoff(8) > setup.scale_cut.cutoff(0));
    }
}
