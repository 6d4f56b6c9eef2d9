//! The seam to the physics library that evaluates covariance integrals.
//!
//! Block writers only decide *which* kernel to evaluate and *where* the result goes;
//! everything physical sits behind [`Theory`].

use crate::config::{ConfigError, RunConfig, Survey};
use crate::types::Spectrum;

/// Speed of light over the Hubble constant in Mpc/h.
pub const C_OVER_H0: f64 = 2997.92458;

const ARCMIN2_PER_STERADIAN: f64 = (10800.0 / std::f64::consts::PI) * (10800.0 / std::f64::consts::PI);

/// Arguments of a single covariance-kernel evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelQuery {
    /// Multipoles of the row and column elements; `0.0` on a count-like side.
    pub ell: [f64; 2],
    /// Width of the multipole bin entering the Gaussian mode count.
    pub dell: f64,
    pub first: Spectrum,
    pub second: Spectrum,
}

pub trait Theory {
    /// Disconnected (sample variance plus noise) contribution.
    fn gaussian(&self, query: &KernelQuery) -> f64;

    /// Connected contribution.
    fn non_gaussian(&self, query: &KernelQuery) -> f64;

    /// Comoving distance to redshift `z` in Mpc/h.
    fn comoving_distance(&self, z: f64) -> f64;
}

impl<T: Theory + ?Sized> Theory for &T {
    fn gaussian(&self, query: &KernelQuery) -> f64 {
        (**self).gaussian(query)
    }

    fn non_gaussian(&self, query: &KernelQuery) -> f64 {
        (**self).non_gaussian(query)
    }

    fn comoving_distance(&self, z: f64) -> f64 {
        (**self).comoving_distance(z)
    }
}

/// Noise-only Gaussian covariance in a flat LCDM background.
///
/// Signal spectra are taken to be zero, so the Gaussian term reduces to shape noise
/// and shot noise through the Knox formula and the connected term vanishes. Cluster
/// probes carry no noise model here.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseOnlyTheory {
    pub omega_m: f64,
    pub fsky: f64,
    /// Shape noise `sigma_e^2 / n` per source bin, in steradians.
    pub source_noise: Vec<f64>,
    /// Shot noise `1 / n` per lens bin, in steradians.
    pub lens_noise: Vec<f64>,
}

impl NoiseOnlyTheory {
    /// Galaxies are split evenly across tomographic bins.
    pub fn for_survey(survey: &Survey, source_bins: usize, lens_bins: usize) -> Self {
        let per_source_bin = survey.n_source / source_bins as f64 * ARCMIN2_PER_STERADIAN;
        let per_lens_bin = survey.n_lens / lens_bins as f64 * ARCMIN2_PER_STERADIAN;
        Self {
            omega_m: 0.3156,
            fsky: survey.fsky(),
            source_noise: vec![survey.sigma_e * survey.sigma_e / per_source_bin; source_bins],
            lens_noise: vec![1.0 / per_lens_bin; lens_bins],
        }
    }

    /// Noise levels for the survey and bin counts a run configuration resolves to.
    pub fn for_config(config: &RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let survey = config.resolved_survey()?;
        let source_bins = config.tomography.source_edges.len() - 1;
        let lens_bins = config.lens_edges()?.len() - 1;
        Ok(Self::for_survey(&survey, source_bins, lens_bins))
    }

    fn source(&self, a: usize, b: usize) -> f64 {
        if a == b { self.source_noise[a] } else { 0.0 }
    }

    fn lens(&self, a: usize, b: usize) -> f64 {
        if a == b { self.lens_noise[a] } else { 0.0 }
    }

    fn hubble_rate(&self, z: f64) -> f64 {
        let a3 = (1.0 + z).powi(3);
        (self.omega_m * a3 + 1.0 - self.omega_m).sqrt()
    }
}

impl Theory for NoiseOnlyTheory {
    fn gaussian(&self, query: &KernelQuery) -> f64 {
        let noise = match (query.first, query.second) {
            (Spectrum::Shear { z1, z2 }, Spectrum::Shear { z1: z3, z2: z4 }) => {
                self.source(z1, z3) * self.source(z2, z4) + self.source(z1, z4) * self.source(z2, z3)
            }
            (
                Spectrum::Ggl { lens: l1, source: s1 },
                Spectrum::Ggl { lens: l2, source: s2 },
            ) => self.lens(l1, l2) * self.source(s1, s2),
            (Spectrum::Clustering { lens: a }, Spectrum::Clustering { lens: b }) => {
                2.0 * self.lens(a, b) * self.lens(a, b)
            }
            _ => 0.0,
        };
        if noise == 0.0 {
            return 0.0;
        }
        let ell = query.ell[0];
        noise / ((2.0 * ell + 1.0) * query.dell * self.fsky)
    }

    fn non_gaussian(&self, _query: &KernelQuery) -> f64 {
        0.0
    }

    fn comoving_distance(&self, z: f64) -> f64 {
        // Composite Simpson rule on 1/E(z).
        const STEPS: usize = 256;
        if z <= 0.0 {
            return 0.0;
        }
        let h = z / STEPS as f64;
        let mut sum = 1.0 / self.hubble_rate(0.0) + 1.0 / self.hubble_rate(z);
        for i in 1..STEPS {
            let weight = if i % 2 == 1 { 4.0 } else { 2.0 };
            sum += weight / self.hubble_rate(i as f64 * h);
        }
        C_OVER_H0 * sum * h / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theory() -> NoiseOnlyTheory {
        NoiseOnlyTheory {
            omega_m: 0.3,
            fsky: 0.5,
            source_noise: vec![1e-9, 2e-9],
            lens_noise: vec![3e-8, 4e-8],
        }
    }

    #[test]
    fn comoving_distance_matches_einstein_de_sitter() {
        let eds = NoiseOnlyTheory {
            omega_m: 1.0,
            ..theory()
        };
        // chi(z) = 2 c/H0 (1 - 1/sqrt(1+z)) for omega_m = 1.
        let z = 1.5;
        let expected = 2.0 * C_OVER_H0 * (1.0 - 1.0 / (1.0 + z as f64).sqrt());
        assert!((eds.comoving_distance(z) - expected).abs() / expected < 1e-8);
        assert_eq!(eds.comoving_distance(0.0), 0.0);
    }

    #[test]
    fn shear_noise_follows_knox_formula() {
        let t = theory();
        let q = KernelQuery {
            ell: [100.0, 100.0],
            dell: 10.0,
            first: Spectrum::Shear { z1: 0, z2: 0 },
            second: Spectrum::Shear { z1: 0, z2: 0 },
        };
        let expected = 2.0 * 1e-18 / (201.0 * 10.0 * 0.5);
        assert!((t.gaussian(&q) - expected).abs() < 1e-30);

        let cross = KernelQuery {
            second: Spectrum::Shear { z1: 0, z2: 1 },
            ..q
        };
        assert_eq!(t.gaussian(&cross), 0.0);
        assert_eq!(t.non_gaussian(&q), 0.0);
    }

    #[test]
    fn unrelated_probes_carry_no_noise() {
        let q = KernelQuery {
            ell: [100.0, 0.0],
            dell: 10.0,
            first: Spectrum::Clustering { lens: 0 },
            second: Spectrum::ClusterCounts {
                cluster_z: 0,
                richness: 0,
            },
        };
        assert_eq!(theory().gaussian(&q), 0.0);
    }
}
