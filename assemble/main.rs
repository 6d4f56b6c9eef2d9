use super::matrix::{AssembleError, Component, assemble_files};
use crate::blocks::BlockKind;
use crate::io::format_sci;
use crate::setup::CovarianceSetup;
use natord::compare;
use ndarray::Array2;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Assemble every block file of a run into one dense matrix file.
#[derive(Debug, Clone)]
pub struct AssembleCommand {
    pub output: PathBuf,
    pub component: Component,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleSummary {
    pub dim: usize,
    pub block_files: usize,
    pub output: PathBuf,
}

pub fn run(
    setup: &CovarianceSetup,
    command: &AssembleCommand,
) -> Result<AssembleSummary, AssembleError> {
    if command.output.exists() {
        return Err(AssembleError::OutputExists(command.output.clone()));
    }
    let paths = discover_block_files(setup)?;
    let dim = setup.index.total_dim();
    println!(
        "> Assembling {} block files into a {dim} x {dim} matrix",
        paths.len()
    );
    let matrix = assemble_files(dim, &paths, command.component)?;
    write_matrix(&command.output, &matrix)?;
    Ok(AssembleSummary {
        dim,
        block_files: paths.len(),
        output: command.output.clone(),
    })
}

/// Block files of this run in `setup.outdir`, naturally sorted so job 10 follows job 9.
pub fn discover_block_files(setup: &CovarianceSetup) -> Result<Vec<PathBuf>, AssembleError> {
    let dir = &setup.outdir;
    let read_dir = fs::read_dir(dir).map_err(|source| AssembleError::Io {
        path: dir.clone(),
        source,
    })?;
    let prefixes: Vec<String> = BlockKind::ALL
        .iter()
        .map(|kind| format!("{}_", setup.stem(kind.tag())))
        .collect();

    let mut paths = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|source| AssembleError::Io {
            path: dir.clone(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_block = prefixes.iter().any(|prefix| {
            name.strip_prefix(prefix.as_str())
                .is_some_and(|job| !job.is_empty() && job.bytes().all(|b| b.is_ascii_digit()))
        });
        if is_block {
            paths.push(entry.path());
        } else {
            log::debug!("ignoring '{}'", entry.path().display());
        }
    }
    if paths.is_empty() {
        return Err(AssembleError::NoBlockFiles(dir.clone()));
    }
    paths.sort_by(|a, b| compare_paths(a, b));
    Ok(paths)
}

fn compare_paths(a: &Path, b: &Path) -> std::cmp::Ordering {
    let name = |p: &Path| {
        p.file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.to_string_lossy().into_owned())
    };
    compare(&name(a), &name(b))
}

/// `i j value` for every element, row-major.
fn write_matrix(path: &Path, matrix: &Array2<f64>) -> Result<(), AssembleError> {
    let io_err = |source| AssembleError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => AssembleError::OutputExists(path.to_path_buf()),
            _ => io_err(e),
        })?;
    let mut writer = BufWriter::new(file);
    for ((i, j), value) in matrix.indexed_iter() {
        writeln!(writer, "{i} {j} {}", format_sci(*value)).map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::theory::NoiseOnlyTheory;

    #[test]
    fn discovery_keeps_only_block_files_in_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::default();
        let survey = config.resolved_survey().unwrap();
        let theory = NoiseOnlyTheory::for_survey(&survey, 5, 9);
        let setup = CovarianceSetup::new(&config, &theory)
            .unwrap()
            .with_outdir(dir.path());
        let stem = setup.stem("ssss");
        for name in [
            format!("{stem}_10"),
            format!("{stem}_9"),
            format!("{stem}_x"),
            format!(".{stem}_11.123.tmp"),
            "notes.txt".to_string(),
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let found = discover_block_files(&setup).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{stem}_9"), format!("{stem}_10")]);
    }
}
