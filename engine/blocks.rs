// ========================================================================================
//
//                                  THE BLOCK WRITERS
//
// ========================================================================================
//
// One routine per ordered pair of probe families. Each routine walks the multipole /
// richness cross-product of its block in a fixed nesting order, places every element
// through the global index map, applies the validity gates and asks the theory for the
// Gaussian and non-Gaussian terms. The emission order is part of the block-file
// contract and must not change.

use crate::index::IndexMap;
use crate::predicates::{multipoles_match, source_behind};
use crate::setup::CovarianceSetup;
use crate::theory::{KernelQuery, Theory};
use crate::types::{CovarianceEntry, ProbeFamily, Spectrum};
use std::fmt;

/// The block families enumerated by the job driver, in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    ShearShear,
    GglGgl,
    ClusteringClustering,
    ClusteringShear,
    ClusteringGgl,
    GglShear,
    CountsCounts,
    LensingLensing,
    LensingCounts,
    ShearCounts,
    ShearLensing,
    GglCounts,
    GglLensing,
    ClusteringCounts,
    ClusteringLensing,
}

impl BlockKind {
    pub const ALL: [BlockKind; 15] = [
        BlockKind::ShearShear,
        BlockKind::GglGgl,
        BlockKind::ClusteringClustering,
        BlockKind::ClusteringShear,
        BlockKind::ClusteringGgl,
        BlockKind::GglShear,
        BlockKind::CountsCounts,
        BlockKind::LensingLensing,
        BlockKind::LensingCounts,
        BlockKind::ShearCounts,
        BlockKind::ShearLensing,
        BlockKind::GglCounts,
        BlockKind::GglLensing,
        BlockKind::ClusteringCounts,
        BlockKind::ClusteringLensing,
    ];

    /// Short tag used in block file names.
    pub fn tag(self) -> &'static str {
        match self {
            Self::ShearShear => "ssss",
            Self::GglGgl => "lsls",
            Self::ClusteringClustering => "llll",
            Self::ClusteringShear => "llss",
            Self::ClusteringGgl => "llls",
            Self::GglShear => "lsss",
            Self::CountsCounts => "nn",
            Self::LensingLensing => "cscs",
            Self::LensingCounts => "csn",
            Self::ShearCounts => "ssn",
            Self::ShearLensing => "sscs",
            Self::GglCounts => "lsn",
            Self::GglLensing => "lscs",
            Self::ClusteringCounts => "lln",
            Self::ClusteringLensing => "llcs",
        }
    }

    /// Row family and column family.
    pub fn families(self) -> (ProbeFamily, ProbeFamily) {
        use ProbeFamily::*;
        match self {
            Self::ShearShear => (Shear, Shear),
            Self::GglGgl => (Ggl, Ggl),
            Self::ClusteringClustering => (Clustering, Clustering),
            Self::ClusteringShear => (Clustering, Shear),
            Self::ClusteringGgl => (Clustering, Ggl),
            Self::GglShear => (Ggl, Shear),
            Self::CountsCounts => (ClusterCounts, ClusterCounts),
            Self::LensingLensing => (ClusterLensing, ClusterLensing),
            Self::LensingCounts => (ClusterLensing, ClusterCounts),
            Self::ShearCounts => (Shear, ClusterCounts),
            Self::ShearLensing => (Shear, ClusterLensing),
            Self::GglCounts => (Ggl, ClusterCounts),
            Self::GglLensing => (Ggl, ClusterLensing),
            Self::ClusteringCounts => (Clustering, ClusterCounts),
            Self::ClusteringLensing => (Clustering, ClusterLensing),
        }
    }

    /// Symmetric kinds only enumerate `second >= first`; the transpose is implied.
    pub fn is_symmetric(self) -> bool {
        matches!(
            self,
            Self::ShearShear | Self::GglGgl | Self::ClusteringClustering
        )
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (row, col) = self.families();
        write!(f, "{} ({row} x {col})", self.tag())
    }
}

/// Evaluates blocks against one setup and one theory.
pub struct BlockWriter<'a, T: Theory + ?Sized> {
    setup: &'a CovarianceSetup,
    theory: &'a T,
}

impl<'a, T: Theory + ?Sized> BlockWriter<'a, T> {
    pub fn new(setup: &'a CovarianceSetup, theory: &'a T) -> Self {
        Self { setup, theory }
    }

    /// All records of block `kind` for the spectrum pair `(first, second)`.
    ///
    /// For blocks against cluster counts, `second` is the cluster redshift bin.
    pub fn compute(&self, kind: BlockKind, first: usize, second: usize) -> Vec<CovarianceEntry> {
        log::debug!("computing {kind} for spectra ({first}, {second})");
        match kind {
            BlockKind::ShearShear => self.shear_shear(first, second),
            BlockKind::GglGgl => self.ggl_ggl(first, second),
            BlockKind::ClusteringClustering => self.clustering_clustering(first, second),
            BlockKind::ClusteringShear => self.clustering_shear(first, second),
            BlockKind::ClusteringGgl => self.clustering_ggl(first, second),
            BlockKind::GglShear => self.ggl_shear(first, second),
            BlockKind::CountsCounts => self.counts_counts(first, second),
            BlockKind::LensingLensing => self.lensing_lensing(first, second),
            BlockKind::LensingCounts => self.lensing_counts(first, second),
            BlockKind::ShearCounts => self.shear_counts(first, second),
            BlockKind::ShearLensing => self.shear_lensing(first, second),
            BlockKind::GglCounts => self.ggl_counts(first, second),
            BlockKind::GglLensing => self.ggl_lensing(first, second),
            BlockKind::ClusteringCounts => self.clustering_counts(first, second),
            BlockKind::ClusteringLensing => self.clustering_lensing(first, second),
        }
    }

    /// The whole cluster-lensing x cluster-lensing sector in one pass, with the
    /// richness bins spelled out: `nzc1 nN1 nzs1 nzc2 nN2 nzs2`.
    pub fn cluster_lensing_sector(&self) -> Vec<CovarianceEntry<6>> {
        let spectra = self.setup.bins.count(ProbeFamily::ClusterLensing);
        let mut out = Vec::new();
        for n1 in 0..spectra {
            for n2 in 0..spectra {
                self.lensing_pair(n1, n2, |entry| out.push(entry));
            }
        }
        out
    }

    // ------------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------------

    fn index(&self) -> &IndexMap {
        &self.setup.index
    }

    fn ncl(&self) -> usize {
        self.setup.grids.continuous.len()
    }

    fn lbin(&self) -> usize {
        self.setup.grids.cluster.len()
    }

    fn richness(&self) -> usize {
        self.setup.bins.richness_bins
    }

    fn ell(&self, i: usize) -> f64 {
        self.setup.grids.continuous.ell(i)
    }

    fn dell(&self, i: usize) -> f64 {
        self.setup.grids.continuous.dell(i)
    }

    fn cluster_ell(&self, i: usize) -> f64 {
        self.setup.grids.cluster.ell(i)
    }

    fn cluster_dell(&self, i: usize) -> f64 {
        self.setup.grids.cluster.dell(i)
    }

    fn below_shear_cut(&self, ell: f64) -> bool {
        ell < self.setup.lmax_shear
    }

    fn passes_scale_cut(&self, ell: f64, lens: usize) -> bool {
        self.setup.scale_cut.passes(ell, lens)
    }

    /// Sources `a` and `b` both lie behind lens bin `lens`.
    fn sources_behind_lens(&self, lens: usize, a: usize, b: usize) -> bool {
        let bins = &self.setup.bins;
        source_behind(&bins.lens, lens, &bins.source, a)
            && source_behind(&bins.lens, lens, &bins.source, b)
    }

    fn gaussian(&self, ell: [f64; 2], dell: f64, first: Spectrum, second: Spectrum) -> f64 {
        self.theory.gaussian(&KernelQuery {
            ell,
            dell,
            first,
            second,
        })
    }

    fn non_gaussian(&self, ell: [f64; 2], first: Spectrum, second: Spectrum) -> f64 {
        self.theory.non_gaussian(&KernelQuery {
            ell,
            dell: 0.0,
            first,
            second,
        })
    }

    fn counts(cluster_z: usize, richness: usize) -> Spectrum {
        Spectrum::ClusterCounts {
            cluster_z,
            richness,
        }
    }

    fn lensing(&self, spectrum: usize, richness: usize) -> (Spectrum, usize, usize) {
        let (cluster_z, source) = self.setup.bins.cluster_lensing_pair(spectrum);
        (
            Spectrum::ClusterLensing {
                cluster_z,
                richness,
                source,
            },
            cluster_z,
            source,
        )
    }

    // ------------------------------------------------------------------------------
    // Continuous x continuous
    // ------------------------------------------------------------------------------

    fn shear_shear(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let bins = &self.setup.bins;
        let (z1, z2) = bins.shear_pair(n1);
        let (z3, z4) = bins.shear_pair(n2);
        let (s1, s2) = (bins.shear_spectrum(n1), bins.shear_spectrum(n2));
        let mut out = Vec::with_capacity(self.ncl() * self.ncl());
        for nl1 in 0..self.ncl() {
            for nl2 in 0..self.ncl() {
                let ell = [self.ell(nl1), self.ell(nl2)];
                let mut c_ng = 0.0;
                let mut c_g = 0.0;
                if self.below_shear_cut(ell[0]) && self.below_shear_cut(ell[1]) {
                    c_ng = self.non_gaussian(ell, s1, s2);
                }
                if nl1 == nl2 {
                    c_g = self.gaussian(ell, self.dell(nl1), s1, s2);
                    // Above the shear cut only auto-spectrum pairs keep their Gaussian term.
                    if ell[0] > self.setup.lmax_shear && n1 != n2 {
                        c_g = 0.0;
                    }
                }
                out.push(CovarianceEntry {
                    row: self.index().shear(n1, nl1),
                    col: self.index().shear(n2, nl2),
                    ell,
                    bins: [z1, z2, z3, z4],
                    gaussian: c_g,
                    non_gaussian: c_ng,
                });
            }
        }
        out
    }

    fn ggl_ggl(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let bins = &self.setup.bins;
        let (zl1, zs1) = bins.ggl_pair(n1);
        let (zl2, zs2) = bins.ggl_pair(n2);
        let (s1, s2) = (bins.ggl_spectrum(n1), bins.ggl_spectrum(n2));
        let mut out = Vec::with_capacity(self.ncl() * self.ncl());
        for nl1 in 0..self.ncl() {
            for nl2 in 0..self.ncl() {
                let ell = [self.ell(nl1), self.ell(nl2)];
                let mut c_ng = 0.0;
                let mut c_g = 0.0;
                let weight =
                    self.passes_scale_cut(ell[0], zl1) && self.passes_scale_cut(ell[1], zl2);
                if weight && zl1 == zl2 {
                    c_ng = self.non_gaussian(ell, s1, s2);
                }
                if weight && nl1 == nl2 {
                    c_g = self.gaussian(ell, self.dell(nl1), s1, s2);
                }
                out.push(CovarianceEntry {
                    row: self.index().ggl(n1, nl1),
                    col: self.index().ggl(n2, nl2),
                    ell,
                    bins: [zl1, zs1, zl2, zs2],
                    gaussian: c_g,
                    non_gaussian: c_ng,
                });
            }
        }
        out
    }

    fn clustering_clustering(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let bins = &self.setup.bins;
        let (z1, z3) = (bins.clustering_bin(n1), bins.clustering_bin(n2));
        let (s1, s2) = (bins.clustering_spectrum(n1), bins.clustering_spectrum(n2));
        let mut out = Vec::with_capacity(self.ncl() * self.ncl());
        for nl1 in 0..self.ncl() {
            for nl2 in 0..self.ncl() {
                let ell = [self.ell(nl1), self.ell(nl2)];
                let mut c_ng = 0.0;
                let mut c_g = 0.0;
                // Clustering spectra in different lens bins do not covary.
                if z1 == z3 {
                    let weight =
                        self.passes_scale_cut(ell[0], z1) && self.passes_scale_cut(ell[1], z3);
                    if weight {
                        c_ng = self.non_gaussian(ell, s1, s2);
                        if nl1 == nl2 {
                            c_g = self.gaussian(ell, self.dell(nl1), s1, s2);
                        }
                    }
                }
                out.push(CovarianceEntry {
                    row: self.index().clustering(n1, nl1),
                    col: self.index().clustering(n2, nl2),
                    ell,
                    bins: [z1, z1, z3, z3],
                    gaussian: c_g,
                    non_gaussian: c_ng,
                });
            }
        }
        out
    }

    fn clustering_shear(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let bins = &self.setup.bins;
        let z1 = bins.clustering_bin(n1);
        let (z3, z4) = bins.shear_pair(n2);
        let (s1, s2) = (bins.clustering_spectrum(n1), bins.shear_spectrum(n2));
        let mut out = Vec::with_capacity(self.ncl() * self.ncl());
        for nl1 in 0..self.ncl() {
            for nl2 in 0..self.ncl() {
                let ell = [self.ell(nl1), self.ell(nl2)];
                let mut c_ng = 0.0;
                let mut c_g = 0.0;
                if self.passes_scale_cut(ell[0], z1) && self.below_shear_cut(ell[1]) {
                    if self.sources_behind_lens(z1, z3, z4) {
                        c_ng = self.non_gaussian(ell, s1, s2);
                    }
                    if nl1 == nl2 {
                        c_g = self.gaussian(ell, self.dell(nl1), s1, s2);
                    }
                }
                out.push(CovarianceEntry {
                    row: self.index().clustering(n1, nl1),
                    col: self.index().shear(n2, nl2),
                    ell,
                    bins: [z1, z1, z3, z4],
                    gaussian: c_g,
                    non_gaussian: c_ng,
                });
            }
        }
        out
    }

    fn clustering_ggl(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let bins = &self.setup.bins;
        let z1 = bins.clustering_bin(n1);
        let (zl, zs) = bins.ggl_pair(n2);
        let (s1, s2) = (bins.clustering_spectrum(n1), bins.ggl_spectrum(n2));
        let mut out = Vec::with_capacity(self.ncl() * self.ncl());
        for nl1 in 0..self.ncl() {
            for nl2 in 0..self.ncl() {
                let ell = [self.ell(nl1), self.ell(nl2)];
                let mut c_ng = 0.0;
                let mut c_g = 0.0;
                if z1 == zl
                    && self.passes_scale_cut(ell[0], z1)
                    && self.passes_scale_cut(ell[1], zl)
                {
                    c_ng = self.non_gaussian(ell, s1, s2);
                    if nl1 == nl2 {
                        c_g = self.gaussian(ell, self.dell(nl1), s1, s2);
                    }
                }
                out.push(CovarianceEntry {
                    row: self.index().clustering(n1, nl1),
                    col: self.index().ggl(n2, nl2),
                    ell,
                    bins: [z1, z1, zl, zs],
                    gaussian: c_g,
                    non_gaussian: c_ng,
                });
            }
        }
        out
    }

    fn ggl_shear(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let bins = &self.setup.bins;
        let (zl, zs) = bins.ggl_pair(n1);
        let (z3, z4) = bins.shear_pair(n2);
        let (s1, s2) = (bins.ggl_spectrum(n1), bins.shear_spectrum(n2));
        let mut out = Vec::with_capacity(self.ncl() * self.ncl());
        for nl1 in 0..self.ncl() {
            for nl2 in 0..self.ncl() {
                let ell = [self.ell(nl1), self.ell(nl2)];
                let mut c_ng = 0.0;
                let mut c_g = 0.0;
                if self.passes_scale_cut(ell[0], zl) && self.below_shear_cut(ell[1]) {
                    if self.sources_behind_lens(zl, z3, z4) {
                        c_ng = self.non_gaussian(ell, s1, s2);
                    }
                    if nl1 == nl2 {
                        c_g = self.gaussian(ell, self.dell(nl1), s1, s2);
                    }
                }
                out.push(CovarianceEntry {
                    row: self.index().ggl(n1, nl1),
                    col: self.index().shear(n2, nl2),
                    ell,
                    bins: [zl, zs, z3, z4],
                    gaussian: c_g,
                    non_gaussian: c_ng,
                });
            }
        }
        out
    }

    // ------------------------------------------------------------------------------
    // Cluster x cluster
    // ------------------------------------------------------------------------------

    /// Number counts have no connected term in this model.
    fn counts_counts(&self, zc1: usize, zc2: usize) -> Vec<CovarianceEntry> {
        let mut out = Vec::with_capacity(self.richness() * self.richness());
        for r1 in 0..self.richness() {
            for r2 in 0..self.richness() {
                let cov = self.gaussian(
                    [0.0, 0.0],
                    0.0,
                    Self::counts(zc1, r1),
                    Self::counts(zc2, r2),
                );
                out.push(CovarianceEntry {
                    row: self.index().cluster_counts(zc1, r1),
                    col: self.index().cluster_counts(zc2, r2),
                    ell: [0.0, 0.0],
                    bins: [zc1, r1, zc2, r2],
                    gaussian: cov,
                    non_gaussian: 0.0,
                });
            }
        }
        out
    }

    /// Shared loop of the per-pair lensing block and the whole-sector file.
    fn lensing_pair(&self, n1: usize, n2: usize, mut emit: impl FnMut(CovarianceEntry<6>)) {
        for r1 in 0..self.richness() {
            let (s1, zc1, zs1) = self.lensing(n1, r1);
            for nl1 in 0..self.lbin() {
                for r2 in 0..self.richness() {
                    let (s2, zc2, zs2) = self.lensing(n2, r2);
                    for nl2 in 0..self.lbin() {
                        let ell = [self.cluster_ell(nl1), self.cluster_ell(nl2)];
                        let c_ng = self.non_gaussian(ell, s1, s2);
                        let c_g = if nl1 == nl2 {
                            self.gaussian(ell, self.cluster_dell(nl1), s1, s2)
                        } else {
                            0.0
                        };
                        emit(CovarianceEntry {
                            row: self.index().cluster_lensing(n1, r1, nl1),
                            col: self.index().cluster_lensing(n2, r2, nl2),
                            ell,
                            bins: [zc1, r1, zs1, zc2, r2, zs2],
                            gaussian: c_g,
                            non_gaussian: c_ng,
                        });
                    }
                }
            }
        }
    }

    fn lensing_lensing(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let mut out = Vec::new();
        self.lensing_pair(n1, n2, |e| {
            let [zc1, _, zs1, zc2, _, zs2] = e.bins;
            out.push(CovarianceEntry {
                row: e.row,
                col: e.col,
                ell: e.ell,
                bins: [zc1, zs1, zc2, zs2],
                gaussian: e.gaussian,
                non_gaussian: e.non_gaussian,
            });
        });
        out
    }

    fn lensing_counts(&self, n1: usize, zc2: usize) -> Vec<CovarianceEntry> {
        let mut out = Vec::with_capacity(self.richness() * self.lbin() * self.richness());
        for r1 in 0..self.richness() {
            let (s1, zc1, zs1) = self.lensing(n1, r1);
            for nl1 in 0..self.lbin() {
                for r2 in 0..self.richness() {
                    let ell = [self.cluster_ell(nl1), 0.0];
                    let cov = self.gaussian(ell, self.cluster_dell(nl1), s1, Self::counts(zc2, r2));
                    out.push(CovarianceEntry {
                        row: self.index().cluster_lensing(n1, r1, nl1),
                        col: self.index().cluster_counts(zc2, r2),
                        ell,
                        bins: [zc1, zs1, zc2, r2],
                        gaussian: cov,
                        non_gaussian: 0.0,
                    });
                }
            }
        }
        out
    }

    // ------------------------------------------------------------------------------
    // Continuous x cluster counts
    // ------------------------------------------------------------------------------

    /// Shared shape of the three `continuous x counts` blocks: only one term, stored
    /// in the Gaussian column, evaluated when `valid(ell)` holds.
    fn continuous_counts(
        &self,
        row_of: impl Fn(usize) -> usize,
        spectrum: Spectrum,
        row_bins: [usize; 2],
        zc2: usize,
        valid: impl Fn(f64) -> bool,
    ) -> Vec<CovarianceEntry> {
        let mut out = Vec::with_capacity(self.ncl() * self.richness());
        for nl1 in 0..self.ncl() {
            for r2 in 0..self.richness() {
                let ell = [self.ell(nl1), 0.0];
                let cov = if valid(ell[0]) {
                    self.gaussian(ell, self.dell(nl1), spectrum, Self::counts(zc2, r2))
                } else {
                    0.0
                };
                out.push(CovarianceEntry {
                    row: row_of(nl1),
                    col: self.index().cluster_counts(zc2, r2),
                    ell,
                    bins: [row_bins[0], row_bins[1], zc2, r2],
                    gaussian: cov,
                    non_gaussian: 0.0,
                });
            }
        }
        out
    }

    fn shear_counts(&self, n1: usize, zc2: usize) -> Vec<CovarianceEntry> {
        let (z1, z2) = self.setup.bins.shear_pair(n1);
        self.continuous_counts(
            |nl1| self.index().shear(n1, nl1),
            self.setup.bins.shear_spectrum(n1),
            [z1, z2],
            zc2,
            |ell| self.below_shear_cut(ell),
        )
    }

    fn ggl_counts(&self, n1: usize, zc2: usize) -> Vec<CovarianceEntry> {
        let (zl, zs) = self.setup.bins.ggl_pair(n1);
        self.continuous_counts(
            |nl1| self.index().ggl(n1, nl1),
            self.setup.bins.ggl_spectrum(n1),
            [zl, zs],
            zc2,
            |ell| self.passes_scale_cut(ell, zl),
        )
    }

    fn clustering_counts(&self, n1: usize, zc2: usize) -> Vec<CovarianceEntry> {
        let z = self.setup.bins.clustering_bin(n1);
        self.continuous_counts(
            |nl1| self.index().clustering(n1, nl1),
            self.setup.bins.clustering_spectrum(n1),
            [z, z],
            zc2,
            |ell| self.passes_scale_cut(ell, z),
        )
    }

    // ------------------------------------------------------------------------------
    // Continuous x cluster lensing
    // ------------------------------------------------------------------------------

    /// Shared shape of the three `continuous x cluster lensing` blocks. The Gaussian
    /// term needs the continuous multipole to match a cluster multipole within
    /// `tolerance`, since the two grids are sampled differently.
    fn continuous_lensing(
        &self,
        row_of: impl Fn(usize) -> usize,
        spectrum: Spectrum,
        row_bins: [usize; 2],
        n2: usize,
        tolerance: f64,
        valid: impl Fn(f64) -> bool,
    ) -> Vec<CovarianceEntry> {
        let mut out = Vec::with_capacity(self.ncl() * self.richness() * self.lbin());
        for nl1 in 0..self.ncl() {
            for r2 in 0..self.richness() {
                let (s2, zc2, zs2) = self.lensing(n2, r2);
                for nl2 in 0..self.lbin() {
                    let ell = [self.ell(nl1), self.cluster_ell(nl2)];
                    let mut c_ng = 0.0;
                    let mut c_g = 0.0;
                    if valid(ell[0]) {
                        c_ng = self.non_gaussian(ell, spectrum, s2);
                        if multipoles_match(ell[0], ell[1], tolerance) {
                            c_g = self.gaussian(ell, self.cluster_dell(nl2), spectrum, s2);
                        }
                    }
                    out.push(CovarianceEntry {
                        row: row_of(nl1),
                        col: self.index().cluster_lensing(n2, r2, nl2),
                        ell,
                        bins: [row_bins[0], row_bins[1], zc2, zs2],
                        gaussian: c_g,
                        non_gaussian: c_ng,
                    });
                }
            }
        }
        out
    }

    fn shear_lensing(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let (z1, z2) = self.setup.bins.shear_pair(n1);
        self.continuous_lensing(
            |nl1| self.index().shear(n1, nl1),
            self.setup.bins.shear_spectrum(n1),
            [z1, z2],
            n2,
            self.setup.tolerances.shear_cluster_lensing,
            |ell| self.below_shear_cut(ell),
        )
    }

    fn ggl_lensing(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let (zl, zs) = self.setup.bins.ggl_pair(n1);
        self.continuous_lensing(
            |nl1| self.index().ggl(n1, nl1),
            self.setup.bins.ggl_spectrum(n1),
            [zl, zs],
            n2,
            self.setup.tolerances.ggl_cluster_lensing,
            |ell| self.passes_scale_cut(ell, zl),
        )
    }

    fn clustering_lensing(&self, n1: usize, n2: usize) -> Vec<CovarianceEntry> {
        let z = self.setup.bins.clustering_bin(n1);
        self.continuous_lensing(
            |nl1| self.index().clustering(n1, nl1),
            self.setup.bins.clustering_spectrum(n1),
            [z, z],
            n2,
            self.setup.tolerances.clustering_cluster_lensing,
            |ell| self.passes_scale_cut(ell, z),
        )
    }
}
