use crate::blocks::BlockWriter;
use crate::config::ConfigError;
use crate::io::{BlockIoError, publish_block};
use crate::partition::{BlockPlan, BlockUnit};
use crate::setup::CovarianceSetup;
use crate::theory::Theory;
use crate::types::CovarianceEntry;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// File tag of the whole cluster-lensing sector.
pub const CLUSTER_LENSING_SECTOR_TAG: &str = "cgl_cgl_all";

/// What a single invocation of the job driver should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCommand {
    /// Report the number of block units without computing anything.
    Count,
    /// Compute the block unit with this 1-based id.
    Job { job_id: usize },
    /// Write the cluster-lensing x cluster-lensing sector to a single file.
    ClusterLensingSector,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverOutcome {
    Counted { total: usize },
    Written {
        unit: Option<BlockUnit>,
        path: PathBuf,
        records: usize,
    },
    /// The block file was already there; nothing was recomputed.
    AlreadyComputed { path: PathBuf },
    /// No unit carries this id. `total` is the size of the plan.
    OutOfRange { job_id: usize, total: usize },
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Block(#[from] BlockIoError),
    #[error("Failed to create output directory '{}': {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Execute one driver command against a prepared setup.
pub fn run<T: Theory + ?Sized>(
    command: DriverCommand,
    setup: &CovarianceSetup,
    theory: &T,
) -> Result<DriverOutcome, DriverError> {
    match command {
        DriverCommand::Count => Ok(DriverOutcome::Counted {
            total: BlockPlan::new(&setup.bins).len(),
        }),
        DriverCommand::Job { job_id } => run_job(setup, theory, job_id),
        DriverCommand::ClusterLensingSector => write_cluster_lensing_sector(setup, theory),
    }
}

pub fn run_job<T: Theory + ?Sized>(
    setup: &CovarianceSetup,
    theory: &T,
    job_id: usize,
) -> Result<DriverOutcome, DriverError> {
    let plan = BlockPlan::new(&setup.bins);
    let Some(unit) = plan.resolve(job_id) else {
        log::info!("job {job_id} is outside the plan of {} blocks", plan.len());
        return Ok(DriverOutcome::OutOfRange {
            job_id,
            total: plan.len(),
        });
    };
    log::info!("resolved {unit}");

    let path = setup.block_path(unit.kind.tag(), unit.job_id);
    if path.exists() {
        return Ok(already_computed(path));
    }
    ensure_outdir(setup)?;

    let entries = BlockWriter::new(setup, theory).compute(unit.kind, unit.first, unit.second);
    publish(path, Some(unit), &entries)
}

pub fn write_cluster_lensing_sector<T: Theory + ?Sized>(
    setup: &CovarianceSetup,
    theory: &T,
) -> Result<DriverOutcome, DriverError> {
    let path = cluster_lensing_sector_path(setup);
    if path.exists() {
        return Ok(already_computed(path));
    }
    ensure_outdir(setup)?;

    let entries = BlockWriter::new(setup, theory).cluster_lensing_sector();
    publish(path, None, &entries)
}

pub fn cluster_lensing_sector_path(setup: &CovarianceSetup) -> PathBuf {
    setup.outdir.join(setup.stem(CLUSTER_LENSING_SECTOR_TAG))
}

fn publish<const B: usize>(
    path: PathBuf,
    unit: Option<BlockUnit>,
    entries: &[CovarianceEntry<B>],
) -> Result<DriverOutcome, DriverError> {
    match publish_block(&path, entries) {
        Ok(records) => {
            log::info!("wrote {records} records to '{}'", path.display());
            Ok(DriverOutcome::Written {
                unit,
                path,
                records,
            })
        }
        Err(BlockIoError::AlreadyExists(path)) => Ok(already_computed(path)),
        Err(e) => Err(e.into()),
    }
}

fn already_computed(path: PathBuf) -> DriverOutcome {
    log::warn!("'{}' already exists, skipping", path.display());
    DriverOutcome::AlreadyComputed { path }
}

fn ensure_outdir(setup: &CovarianceSetup) -> Result<(), DriverError> {
    fs::create_dir_all(&setup.outdir).map_err(|source| DriverError::OutputDir {
        path: setup.outdir.clone(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockKind;
    use crate::config::RunConfig;
    use crate::theory::NoiseOnlyTheory;

    fn setup(outdir: &std::path::Path) -> (CovarianceSetup, NoiseOnlyTheory) {
        let mut config = RunConfig::default();
        config.survey.scenario = 0;
        config.binning.ncl = 8;
        config.tomography.richness_bins = 2;
        let survey = config.resolved_survey().unwrap();
        let theory = NoiseOnlyTheory::for_survey(&survey, 5, 5);
        let setup = CovarianceSetup::new(&config, &theory)
            .unwrap()
            .with_outdir(outdir);
        (setup, theory)
    }

    #[test]
    fn job_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let (setup, theory) = setup(&dir.path().join("out"));
        let first = run(DriverCommand::Job { job_id: 1 }, &setup, &theory).unwrap();
        let DriverOutcome::Written { unit, path, records } = first else {
            panic!("expected a written block");
        };
        assert_eq!(unit.map(|u| u.kind), Some(BlockKind::ShearShear));
        assert_eq!(records, 64);
        assert_eq!(path, setup.block_path("ssss", 1));
        let content = fs::read_to_string(&path).unwrap();

        let second = run(DriverCommand::Job { job_id: 1 }, &setup, &theory).unwrap();
        assert_eq!(second, DriverOutcome::AlreadyComputed { path: path.clone() });
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn out_of_range_reports_total() {
        let dir = tempfile::tempdir().unwrap();
        let (setup, theory) = setup(dir.path());
        let DriverOutcome::Counted { total } = run(DriverCommand::Count, &setup, &theory).unwrap()
        else {
            panic!("count should report a total");
        };
        let outcome = run(DriverCommand::Job { job_id: total + 1 }, &setup, &theory).unwrap();
        assert_eq!(
            outcome,
            DriverOutcome::OutOfRange {
                job_id: total + 1,
                total
            }
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn sector_file_has_six_bin_columns() {
        let dir = tempfile::tempdir().unwrap();
        let (setup, theory) = setup(dir.path());
        let outcome = run(DriverCommand::ClusterLensingSector, &setup, &theory).unwrap();
        let DriverOutcome::Written { unit: None, path, .. } = outcome else {
            panic!("expected the sector file");
        };
        assert!(path.ends_with(setup.stem(CLUSTER_LENSING_SECTOR_TAG)));
        let content = fs::read_to_string(&path).unwrap();
        let first = content.lines().next().unwrap();
        assert_eq!(first.split(' ').count(), 2 + 2 + 6 + 2);
    }
}
