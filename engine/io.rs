//! Block-file records and their publication.
//!
//! A block file holds one whitespace-separated record per line:
//! `row col ellA ellB b1 .. bN covG covNG`. Floats are printed the way C's `%e`
//! prints them so files are byte-comparable with earlier production runs.

use crate::types::CovarianceEntry;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockIoError {
    #[error("Output file '{}' already exists and will not be overwritten.", .0.display())]
    AlreadyExists(PathBuf),
    #[error("Failed to write block file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// `x` in C `%e` notation: six fractional digits and a signed, at least two-digit exponent.
pub fn format_sci(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let raw = format!("{x:.6e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    match exponent.parse::<i32>() {
        Ok(e) => {
            let sign = if e < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", e.unsigned_abs())
        }
        Err(_) => raw,
    }
}

impl<const B: usize> fmt::Display for CovarianceEntry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.row,
            self.col,
            format_sci(self.ell[0]),
            format_sci(self.ell[1])
        )?;
        for bin in self.bins {
            write!(f, " {bin}")?;
        }
        write!(
            f,
            " {} {}",
            format_sci(self.gaussian),
            format_sci(self.non_gaussian)
        )
    }
}

pub fn write_entries<W: Write, const B: usize>(
    writer: &mut W,
    entries: &[CovarianceEntry<B>],
) -> io::Result<()> {
    for entry in entries {
        writeln!(writer, "{entry}")?;
    }
    Ok(())
}

/// Writes `entries` to `path` without ever exposing a partial file.
///
/// Records go to a private temporary file next to `path`, which is then hard-linked
/// into place. Linking fails when `path` already exists, so two jobs racing on the
/// same block cannot clobber each other; the loser gets [`BlockIoError::AlreadyExists`].
/// Returns the number of records written.
pub fn publish_block<const B: usize>(
    path: &Path,
    entries: &[CovarianceEntry<B>],
) -> Result<usize, BlockIoError> {
    if path.exists() {
        return Err(BlockIoError::AlreadyExists(path.to_path_buf()));
    }
    let io_err = |source| BlockIoError::Io {
        path: path.to_path_buf(),
        source,
    };

    let (temp_path, temp_file) = create_temp_beside(path).map_err(io_err)?;
    let write_result = (|| -> io::Result<()> {
        let mut writer = BufWriter::new(temp_file);
        write_entries(&mut writer, entries)?;
        writer.flush()?;
        let file = writer.into_inner().map_err(io::Error::other)?;
        file.sync_all()
    })();

    let outcome = write_result.and_then(|()| link_no_clobber(&temp_path, path));
    let _ = fs::remove_file(&temp_path);
    match outcome {
        Ok(()) => {
            log::debug!("published {} records to '{}'", entries.len(), path.display());
            Ok(entries.len())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(BlockIoError::AlreadyExists(path.to_path_buf()))
        }
        Err(e) => Err(io_err(e)),
    }
}

fn create_temp_beside(path: &Path) -> io::Result<(PathBuf, fs::File)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Output path '{}' has no file name.", path.display()),
        )
    })?;

    let pid = std::process::id();
    let ts_nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    for attempt in 0..32u32 {
        let candidate = dir.join(format!(
            ".{}.{}.{}.tmp",
            name.to_string_lossy(),
            pid,
            ts_nanos + attempt as u128
        ));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(file) => return Ok((candidate, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!(
            "Failed to allocate a unique temporary output file in '{}'.",
            dir.display()
        ),
    ))
}

fn link_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(e) => {
            // Some filesystems refuse hard links; a checked rename still never truncates.
            log::warn!(
                "hard link into '{}' failed ({e}); falling back to rename",
                to.display()
            );
            if to.exists() {
                return Err(io::Error::from(io::ErrorKind::AlreadyExists));
            }
            fs::rename(from, to)
        }
    }
}
