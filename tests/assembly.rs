use std::fs;
use std::process::Command;

use covparallel::assemble::{self, AssembleCommand, AssembleError, Component};
use covparallel::blocks::BlockKind;
use covparallel::config::RunConfig;
use covparallel::driver::{self, DriverOutcome};
use covparallel::partition::BlockPlan;
use covparallel::setup::CovarianceSetup;
use covparallel::theory::NoiseOnlyTheory;
use covparallel::types::ProbeFamily;
use tempfile::tempdir;

const SMALL_RUN: &str = r#"
[survey]
scenario = 0

[binning]
ncl = 6

[tomography]
richness_bins = 2
"#;

fn computed_run(outdir: &std::path::Path) -> (CovarianceSetup, usize) {
    let config = RunConfig::from_toml_str(SMALL_RUN).expect("config");
    let theory = NoiseOnlyTheory::for_config(&config).expect("theory");
    let setup = CovarianceSetup::new(&config, &theory)
        .expect("setup")
        .with_outdir(outdir);
    let total = BlockPlan::new(&setup.bins).len();
    for job_id in 1..=total {
        let outcome = driver::run_job(&setup, &theory, job_id).expect("job");
        assert!(matches!(outcome, DriverOutcome::Written { .. }), "job {job_id}: {outcome:?}");
    }
    (setup, total)
}

#[test]
fn every_block_together_covers_the_matrix_exactly_once() {
    let tmp = tempdir().expect("temporary directory");
    let blocks = tmp.path().join("blocks");
    let (setup, total) = computed_run(&blocks);
    assert_eq!(fs::read_dir(&blocks).unwrap().count(), total);

    let dim = setup.index.total_dim();
    let expected_dim: usize = ProbeFamily::ALL.iter().map(|&f| setup.index.len(f)).sum();
    assert_eq!(dim, expected_dim);

    let output = tmp.path().join("cov.txt");
    let summary = assemble::run(
        &setup,
        &AssembleCommand {
            output: output.clone(),
            component: Component::Total,
        },
    )
    .expect("assembly");
    assert_eq!(summary.dim, dim);
    assert_eq!(summary.block_files, total);

    let content = fs::read_to_string(&output).expect("matrix file");
    assert_eq!(content.lines().count(), dim * dim);
    let first_shear = content.lines().next().unwrap();
    let value: f64 = first_shear.split(' ').nth(2).unwrap().parse().unwrap();
    assert!(value > 0.0, "shear auto-variance should be positive: {first_shear}");
}

#[test]
fn missing_block_is_reported_as_a_gap() {
    let tmp = tempdir().expect("temporary directory");
    let (setup, _) = computed_run(tmp.path());
    let first_counts_block = BlockPlan::new(&setup.bins)
        .iter()
        .find(|u| u.kind == BlockKind::CountsCounts)
        .map(|u| u.job_id)
        .expect("nn unit");
    fs::remove_file(setup.block_path("nn", first_counts_block)).expect("remove block");

    let result = assemble::run(
        &setup,
        &AssembleCommand {
            output: tmp.path().join("cov.txt"),
            component: Component::Gaussian,
        },
    );
    assert!(matches!(result, Err(AssembleError::Gaps { .. })), "{result:?}");
    assert!(!tmp.path().join("cov.txt").exists());
}

#[test]
fn assembler_cli_writes_the_full_matrix() {
    let tmp = tempdir().expect("temporary directory");
    let blocks = tmp.path().join("blocks");
    let (setup, _) = computed_run(&blocks);
    let config_path = tmp.path().join("run.toml");
    fs::write(&config_path, SMALL_RUN).expect("write config");
    let output = tmp.path().join("cov_ng.txt");

    let run = || {
        Command::new(env!("CARGO_BIN_EXE_covassemble"))
            .args([
                "--config",
                config_path.to_str().unwrap(),
                "--outdir",
                blocks.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
                "--component",
                "ng",
            ])
            .status()
            .expect("run covassemble")
    };
    let status = run();
    assert!(status.success(), "CLI exited with {status:?}");
    let dim = setup.index.total_dim();
    let content = fs::read_to_string(&output).expect("matrix file");
    assert_eq!(content.lines().count(), dim * dim);
    assert!(content.lines().all(|l| l.ends_with(" 0.000000e+00")));

    let again = run();
    assert_eq!(again.code(), Some(2));
}
