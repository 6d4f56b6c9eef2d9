use crate::io::format_sci;
use crate::predicates::DiagonalTolerances;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ========================================================================================
//                                Survey scenario table
// ========================================================================================

/// One row of the fixed forecast table: a survey depth at a given footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurveyScenario {
    pub designation: &'static str,
    /// Footprint in square degrees.
    pub area: f64,
    /// Source galaxies per square arcminute.
    pub n_source: f64,
    /// Lens galaxies per square arcminute.
    pub n_lens: f64,
    pub lens_bins: usize,
}

const fn scenario(
    designation: &'static str,
    area: f64,
    n_source: f64,
    n_lens: f64,
    lens_bins: usize,
) -> SurveyScenario {
    SurveyScenario {
        designation,
        area,
        n_source,
        n_lens,
        lens_bins,
    }
}

pub static SURVEY_SCENARIOS: [SurveyScenario; 12] = [
    scenario("LSST_Y1", 7500.0, 9.8, 15.0, 5),
    scenario("LSST_Y1", 13000.0, 12.1, 20.0, 5),
    scenario("LSST_Y1", 16000.0, 15.1, 25.0, 5),
    scenario("LSST_Y3", 10000.0, 15.1, 25.0, 7),
    scenario("LSST_Y3", 15000.0, 18.9, 32.0, 7),
    scenario("LSST_Y3", 20000.0, 23.5, 41.0, 7),
    scenario("LSST_Y6", 10000.0, 20.3, 35.0, 9),
    scenario("LSST_Y6", 15000.0, 23.5, 41.0, 9),
    scenario("LSST_Y6", 20000.0, 26.9, 48.0, 9),
    scenario("LSST_Y10", 10000.0, 26.9, 48.0, 10),
    scenario("LSST_Y10", 15000.0, 30.8, 57.0, 10),
    scenario("LSST_Y10", 20000.0, 35.0, 67.0, 10),
];

/// The production covariance runs use the Y6 / 15000 deg² row.
pub const DEFAULT_SCENARIO: usize = 7;

// ========================================================================================
//                                     Errors
// ========================================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Survey scenario {index} is out of range (the table has {len} entries).")]
    UnknownScenario { index: usize, len: usize },
    #[error("Invalid binning: {0}")]
    InvalidBinning(String),
    #[error("Bin edges for {name} must contain at least two strictly increasing values, got {edges:?}.")]
    InvalidEdges { name: &'static str, edges: Vec<f64> },
    #[error("Expected {expected} lens bins for scenario {scenario}, but {found} were configured.")]
    LensBinMismatch {
        scenario: usize,
        expected: usize,
        found: usize,
    },
    #[error("At least one richness bin is required.")]
    NoRichnessBins,
    #[error("Diagonal tolerance '{name}' must be positive and finite, got {value}.")]
    InvalidTolerance { name: &'static str, value: f64 },
    #[error("Survey parameter '{name}' must be positive and finite, got {value}.")]
    InvalidSurveyParameter { name: &'static str, value: f64 },
}

// ========================================================================================
//                                  Configuration
// ========================================================================================

/// Everything a covariance run depends on. Built once at process start and never
/// mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub survey: SurveyConfig,
    pub binning: BinningConfig,
    pub tomography: TomographyConfig,
    pub tolerances: DiagonalTolerances,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurveyConfig {
    /// Index into [`SURVEY_SCENARIOS`].
    pub scenario: usize,
    pub area: Option<f64>,
    pub n_source: Option<f64>,
    pub n_lens: Option<f64>,
    /// Intrinsic ellipticity dispersion.
    pub sigma_e: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinningConfig {
    pub ncl: usize,
    pub lmin: f64,
    pub lmax: f64,
    pub lmax_shear: f64,
    /// Smallest scale (Mpc/h) on which the linear bias model is trusted.
    pub rmin_bias: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomographyConfig {
    pub source_edges: Vec<f64>,
    /// Explicit lens edges. When absent, the scenario's lens-bin count is spread
    /// linearly over `lens_z_range`.
    pub lens_edges: Option<Vec<f64>>,
    pub lens_z_range: [f64; 2],
    pub cluster_edges: Vec<f64>,
    pub richness_bins: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub outdir: PathBuf,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            scenario: DEFAULT_SCENARIO,
            area: None,
            n_source: None,
            n_lens: None,
            sigma_e: 0.26,
        }
    }
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            ncl: 20,
            lmin: 20.0,
            lmax: 15000.0,
            lmax_shear: 3000.0,
            rmin_bias: 21.0,
        }
    }
}

impl Default for TomographyConfig {
    fn default() -> Self {
        Self {
            source_edges: vec![0.0, 0.45, 0.65, 0.9, 1.25, 3.5],
            lens_edges: None,
            lens_z_range: [0.2, 1.2],
            cluster_edges: vec![0.2, 0.4, 0.6, 0.8, 1.0],
            richness_bins: 4,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("covparallel"),
        }
    }
}

/// The survey parameters after the scenario row and any overrides are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
    pub designation: String,
    pub area: f64,
    pub n_source: f64,
    pub n_lens: f64,
    pub sigma_e: f64,
}

impl Survey {
    /// Sky fraction covered by the footprint.
    pub fn fsky(&self) -> f64 {
        self.area / 41253.0
    }

    /// `{designation}_area{area}_ng{n_source}_nl{n_lens}` with C-style scientific numbers.
    pub fn name(&self) -> String {
        format!(
            "{}_area{}_ng{}_nl{}",
            self.designation,
            format_sci(self.area),
            format_sci(self.n_source),
            format_sci(self.n_lens)
        )
    }
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn scenario(&self) -> Result<&'static SurveyScenario, ConfigError> {
        SURVEY_SCENARIOS
            .get(self.survey.scenario)
            .ok_or(ConfigError::UnknownScenario {
                index: self.survey.scenario,
                len: SURVEY_SCENARIOS.len(),
            })
    }

    pub fn resolved_survey(&self) -> Result<Survey, ConfigError> {
        let row = self.scenario()?;
        Ok(Survey {
            designation: row.designation.to_string(),
            area: self.survey.area.unwrap_or(row.area),
            n_source: self.survey.n_source.unwrap_or(row.n_source),
            n_lens: self.survey.n_lens.unwrap_or(row.n_lens),
            sigma_e: self.survey.sigma_e,
        })
    }

    pub fn lens_edges(&self) -> Result<Vec<f64>, ConfigError> {
        if let Some(edges) = &self.tomography.lens_edges {
            return Ok(edges.clone());
        }
        let nbins = self.scenario()?.lens_bins;
        let [lo, hi] = self.tomography.lens_z_range;
        let step = (hi - lo) / nbins as f64;
        Ok((0..=nbins).map(|i| lo + step * i as f64).collect())
    }

    /// Checks every invariant the covariance setup relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let row = self.scenario()?;
        let survey = self.resolved_survey()?;
        for (name, value) in [
            ("area", survey.area),
            ("n_source", survey.n_source),
            ("n_lens", survey.n_lens),
            ("sigma_e", survey.sigma_e),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSurveyParameter { name, value });
            }
        }

        let b = &self.binning;
        if b.ncl == 0 {
            return Err(ConfigError::InvalidBinning("ncl must be at least 1".into()));
        }
        if !(b.lmin > 0.0 && b.lmin < b.lmax && b.lmax.is_finite()) {
            return Err(ConfigError::InvalidBinning(format!(
                "require 0 < lmin < lmax, got lmin={} lmax={}",
                b.lmin, b.lmax
            )));
        }
        if !(b.lmax_shear > b.lmin && b.lmax_shear <= b.lmax) {
            return Err(ConfigError::InvalidBinning(format!(
                "lmax_shear={} must lie in (lmin, lmax]",
                b.lmax_shear
            )));
        }
        if !(b.rmin_bias.is_finite() && b.rmin_bias > 0.0) {
            return Err(ConfigError::InvalidBinning(format!(
                "rmin_bias must be positive, got {}",
                b.rmin_bias
            )));
        }

        check_edges("source", &self.tomography.source_edges)?;
        check_edges("cluster", &self.tomography.cluster_edges)?;
        let lens = self.lens_edges()?;
        check_edges("lens", &lens)?;
        if self.tomography.lens_edges.is_some() && lens.len() - 1 != row.lens_bins {
            return Err(ConfigError::LensBinMismatch {
                scenario: self.survey.scenario,
                expected: row.lens_bins,
                found: lens.len() - 1,
            });
        }
        if self.tomography.richness_bins == 0 {
            return Err(ConfigError::NoRichnessBins);
        }

        self.tolerances.validate()
    }
}

fn check_edges(name: &'static str, edges: &[f64]) -> Result<(), ConfigError> {
    let increasing = edges.windows(2).all(|w| w[0] < w[1]);
    if edges.len() < 2 || !increasing || edges.iter().any(|z| !z.is_finite()) {
        return Err(ConfigError::InvalidEdges {
            name,
            edges: edges.to_vec(),
        });
    }
    Ok(())
}
