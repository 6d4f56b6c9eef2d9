//! Parsing of block files and their placement into the dense covariance.

use ndarray::Array2;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error("{}:{line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("{}:{line}: element ({row}, {col}) lies outside the {dim} x {dim} matrix", path.display())]
    IndexOutOfRange {
        path: PathBuf,
        line: usize,
        row: usize,
        col: usize,
        dim: usize,
    },
    #[error("Element ({row}, {col}) is written by both '{}' and '{}'", first.display(), second.display())]
    Overlap {
        row: usize,
        col: usize,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("{count} matrix elements have no block record, first missing at ({row}, {col})")]
    Gaps { count: usize, row: usize, col: usize },
    #[error("No block files found in '{}'", .0.display())]
    NoBlockFiles(PathBuf),
    #[error("Output file '{}' already exists and will not be overwritten.", .0.display())]
    OutputExists(PathBuf),
}

/// Which covariance term ends up in the assembled matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Component {
    #[value(name = "g")]
    Gaussian,
    #[value(name = "ng")]
    NonGaussian,
    #[default]
    Total,
}

impl Component {
    pub fn select(self, gaussian: f64, non_gaussian: f64) -> f64 {
        match self {
            Self::Gaussian => gaussian,
            Self::NonGaussian => non_gaussian,
            Self::Total => gaussian + non_gaussian,
        }
    }
}

/// The position and both covariance terms of one block-file line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockRecord {
    pub row: usize,
    pub col: usize,
    pub gaussian: f64,
    pub non_gaussian: f64,
}

/// Parses one block file. Both the 4-bin-id and the 6-bin-id layouts are accepted;
/// only the leading indices and the trailing two terms are kept.
pub fn parse_block_file(path: &Path, dim: usize) -> Result<Vec<BlockRecord>, AssembleError> {
    let text = fs::read_to_string(path).map_err(|source| AssembleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut records = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_line(line).map_err(|reason| AssembleError::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            reason,
        })?;
        if record.row >= dim || record.col >= dim {
            return Err(AssembleError::IndexOutOfRange {
                path: path.to_path_buf(),
                line: i + 1,
                row: record.row,
                col: record.col,
                dim,
            });
        }
        records.push(record);
    }
    Ok(records)
}

fn parse_line(line: &str) -> Result<BlockRecord, String> {
    let fields: Vec<&str> = line.split_ascii_whitespace().collect();
    if fields.len() != 10 && fields.len() != 12 {
        return Err(format!("expected 10 or 12 fields, found {}", fields.len()));
    }
    let index = |s: &str| {
        lexical_core::parse::<usize>(s.as_bytes()).map_err(|e| format!("bad index '{s}': {e}"))
    };
    let value = |s: &str| {
        lexical_core::parse::<f64>(s.as_bytes()).map_err(|e| format!("bad value '{s}': {e}"))
    };
    let n = fields.len();
    Ok(BlockRecord {
        row: index(fields[0])?,
        col: index(fields[1])?,
        gaussian: value(fields[n - 2])?,
        non_gaussian: value(fields[n - 1])?,
    })
}

/// Fills a `dim x dim` matrix from parsed block files.
///
/// Every element must be written by exactly one record, either directly or through
/// its transpose. A zero record still counts as written.
pub fn fill_matrix(
    dim: usize,
    blocks: &[(PathBuf, Vec<BlockRecord>)],
    component: Component,
) -> Result<Array2<f64>, AssembleError> {
    let mut values = Array2::<f64>::zeros((dim, dim));
    let mut owner: Array2<Option<u32>> = Array2::from_elem((dim, dim), None);

    for (file, (path, records)) in blocks.iter().enumerate() {
        for r in records {
            let cell = (r.row, r.col);
            if let Some(previous) = owner[cell] {
                return Err(AssembleError::Overlap {
                    row: r.row,
                    col: r.col,
                    first: blocks[previous as usize].0.clone(),
                    second: path.clone(),
                });
            }
            owner[cell] = Some(file as u32);
            values[cell] = component.select(r.gaussian, r.non_gaussian);
        }
    }

    let mut missing = 0usize;
    let mut first_missing = None;
    for i in 0..dim {
        for j in 0..dim {
            if owner[(i, j)].is_some() {
                continue;
            }
            if owner[(j, i)].is_some() {
                values[(i, j)] = values[(j, i)];
            } else {
                missing += 1;
                first_missing.get_or_insert((i, j));
            }
        }
    }
    if let Some((row, col)) = first_missing {
        return Err(AssembleError::Gaps {
            count: missing,
            row,
            col,
        });
    }
    Ok(values)
}

/// Parses `paths` in parallel and assembles them.
pub fn assemble_files(
    dim: usize,
    paths: &[PathBuf],
    component: Component,
) -> Result<Array2<f64>, AssembleError> {
    let blocks = paths
        .par_iter()
        .map(|p| parse_block_file(p, dim).map(|records| (p.clone(), records)))
        .collect::<Result<Vec<_>, _>>()?;
    let records: usize = blocks.iter().map(|(_, r)| r.len()).sum();
    log::info!("parsed {records} records from {} block files", blocks.len());
    fill_matrix(dim, &blocks, component)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row: usize, col: usize, g: f64, ng: f64) -> BlockRecord {
        BlockRecord {
            row,
            col,
            gaussian: g,
            non_gaussian: ng,
        }
    }

    #[test]
    fn parses_both_line_layouts() {
        let short = parse_line("3 17 2.550000e+01 1.234000e+03 0 1 2 4 1.500000e-12 0.000000e+00")
            .unwrap();
        assert_eq!(short, record(3, 17, 1.5e-12, 0.0));
        let long =
            parse_line("0 1 1.000000e+00 1.000000e+00 1 2 3 4 5 6 0.000000e+00 2.000000e+00")
                .unwrap();
        assert_eq!(long, record(0, 1, 0.0, 2.0));
        assert!(parse_line("0 1 2").is_err());
        assert!(parse_line("x 1 1.0 1.0 0 0 0 0 1.0 1.0").is_err());
    }

    #[test]
    fn transpose_fills_the_other_triangle() {
        let blocks = vec![(
            PathBuf::from("a"),
            vec![
                record(0, 0, 1.0, 0.5),
                record(0, 1, 2.0, 0.0),
                record(1, 1, 3.0, 0.0),
            ],
        )];
        let m = fill_matrix(2, &blocks, Component::Total).unwrap();
        assert_eq!(m[(0, 0)], 1.5);
        assert_eq!(m[(1, 0)], 2.0);
        let g = fill_matrix(2, &blocks, Component::Gaussian).unwrap();
        assert_eq!(g[(0, 0)], 1.0);
    }

    #[test]
    fn duplicate_and_missing_elements_are_errors() {
        let overlap = vec![
            (PathBuf::from("a"), vec![record(0, 1, 1.0, 0.0)]),
            (PathBuf::from("b"), vec![record(0, 1, 1.0, 0.0)]),
        ];
        assert!(matches!(
            fill_matrix(2, &overlap, Component::Total),
            Err(AssembleError::Overlap { row: 0, col: 1, .. })
        ));

        let gap = vec![(PathBuf::from("a"), vec![record(0, 0, 0.0, 0.0), record(0, 1, 0.0, 0.0)])];
        assert!(matches!(
            fill_matrix(2, &gap, Component::Total),
            Err(AssembleError::Gaps { count: 1, row: 1, col: 1 })
        ));
    }

    #[test]
    fn out_of_range_index_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block_1");
        fs::write(
            &path,
            "0 0 1.0e+00 1.0e+00 0 0 0 0 1.0e+00 0.0e+00\n0 5 1.0e+00 1.0e+00 0 0 0 0 1.0e+00 0.0e+00\n",
        )
        .unwrap();
        assert!(matches!(
            parse_block_file(&path, 4),
            Err(AssembleError::IndexOutOfRange { line: 2, col: 5, .. })
        ));
    }
}
