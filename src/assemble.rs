// ========================================================================================
//
//                      THE MATRIX ASSEMBLER: COVASSEMBLE
//
// ========================================================================================
//
// Collects the block files written by `covparallel` jobs and joins them into the full
// symmetric covariance matrix. Every element must be covered exactly once, directly
// or through its transpose; anything else aborts without writing output.

use clap::Parser;
use covparallel::assemble::{self, AssembleCommand, AssembleError, Component};
use covparallel::config::RunConfig;
use covparallel::setup::CovarianceSetup;
use covparallel::theory::NoiseOnlyTheory;
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Parser, Debug)]
#[clap(
    name = "covassemble",
    version,
    about = "Assembles covparallel block files into the full covariance matrix."
)]
struct Args {
    /// TOML run configuration used for the block run.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Directory holding the block files; overrides the configuration.
    #[clap(long)]
    outdir: Option<PathBuf>,

    /// Destination of the `i j value` matrix file. Must not exist yet.
    #[clap(long)]
    output: PathBuf,

    /// Covariance term to assemble.
    #[clap(long, value_enum, default_value_t = Component::Total)]
    component: Component,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let start_time = Instant::now();
    let args = Args::parse();

    let setup = match prepare(&args) {
        Ok(setup) => setup,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    };

    let command = AssembleCommand {
        output: args.output,
        component: args.component,
    };
    match assemble::run(&setup, &command) {
        Ok(summary) => {
            eprintln!(
                "> Wrote {} x {} matrix from {} block files to {} in {:.2?}",
                summary.dim,
                summary.dim,
                summary.block_files,
                summary.output.display(),
                start_time.elapsed()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(2);
        }
    }
}

fn prepare(args: &Args) -> Result<CovarianceSetup, AssembleError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_toml_file(path)?,
        None => RunConfig::default(),
    };
    if let Some(outdir) = &args.outdir {
        config.output.outdir = outdir.clone();
    }
    let theory = NoiseOnlyTheory::for_config(&config)?;
    Ok(CovarianceSetup::new(&config, &theory)?)
}
