// ========================================================================================
//
//                      THE JOB DRIVER: COVPARALLEL
//
// ========================================================================================
//
// One invocation computes one block of the covariance matrix. A batch system launches
// many copies side by side, each with its own array index as the job id; the only
// coordination between them is the output directory.
//
// ### Exit status ###
//
// 0  the block was written, or the job id lies past the end of the plan
// 1  the block file already exists and was left untouched
// 2  invalid arguments, invalid configuration or an I/O failure

use clap::Parser;
use covparallel::config::RunConfig;
use covparallel::driver::{self, DriverCommand, DriverError, DriverOutcome};
use covparallel::setup::CovarianceSetup;
use covparallel::theory::NoiseOnlyTheory;
use std::path::PathBuf;
use std::process;

const EXIT_ALREADY_COMPUTED: i32 = 1;
const EXIT_FATAL: i32 = 2;

// ========================================================================================
//                         COMMAND-LINE INTERFACE DEFINITION
// ========================================================================================

#[derive(Parser, Debug)]
#[clap(
    name = "covparallel",
    version,
    about = "Computes one block of a multi-probe survey covariance matrix per invocation."
)]
struct Args {
    /// 1-based block id, usually the batch array index.
    #[clap(required_unless_present_any = ["count", "cluster_lensing_sector"])]
    job_id: Option<usize>,

    /// TOML run configuration. Without it the production LSST setup is used.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Directory for block files; overrides the configuration.
    #[clap(long)]
    outdir: Option<PathBuf>,

    /// Print the number of blocks and exit.
    #[clap(long, conflicts_with = "cluster_lensing_sector")]
    count: bool,

    /// Write the whole cluster-lensing sector to one file instead of a single block.
    #[clap(long)]
    cluster_lensing_sector: bool,
}

// ========================================================================================
//                           THE MAIN ORCHESTRATION LOGIC
// ========================================================================================

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (setup, theory) = match prepare(&args) {
        Ok(prepared) => prepared,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_FATAL);
        }
    };

    let command = if args.count {
        DriverCommand::Count
    } else if args.cluster_lensing_sector {
        DriverCommand::ClusterLensingSector
    } else {
        match args.job_id {
            Some(job_id) => DriverCommand::Job { job_id },
            None => {
                eprintln!("Error: a job id is required");
                process::exit(EXIT_FATAL);
            }
        }
    };

    match driver::run(command, &setup, &theory) {
        Ok(DriverOutcome::Counted { total }) | Ok(DriverOutcome::OutOfRange { total, .. }) => {
            println!("number of cov blocks for parallelization: {total}");
        }
        Ok(DriverOutcome::Written { unit, path, records }) => {
            if let Some(unit) = unit {
                eprintln!("> Computed {unit}");
            }
            eprintln!("> Wrote {records} records to {}", path.display());
        }
        Ok(DriverOutcome::AlreadyComputed { path }) => {
            eprintln!("> {} already exists, nothing to do.", path.display());
            process::exit(EXIT_ALREADY_COMPUTED);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(EXIT_FATAL);
        }
    }
}

/// Loads the configuration and builds the immutable run context.
fn prepare(args: &Args) -> Result<(CovarianceSetup, NoiseOnlyTheory), DriverError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_toml_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(outdir) = &args.outdir {
        config.output.outdir = outdir.clone();
    }
    let theory = NoiseOnlyTheory::for_config(&config)?;
    let setup = CovarianceSetup::new(&config, &theory)?;
    eprintln!(
        "> Survey {}: {} x {} covariance elements",
        setup.survey.name(),
        setup.index.total_dim(),
        setup.index.total_dim()
    );
    Ok((setup, theory))
}
