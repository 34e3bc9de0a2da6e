//! Output persistence: destination resolution and atomic writes.
//!
//! The generated file is written to a `tempfile::NamedTempFile` in the
//! destination directory and renamed into place only after it is complete.
//! Any error before the rename drops the temporary file, which deletes it,
//! so the destination is either untouched or fully replaced.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::OptgenError;
use crate::types::{OutputPath, Target};

/// Pure function of the filesystem layout: where does the output go, and in
/// which dialect?
///
/// A destination naming an existing directory receives
/// `<source stem>.<ext>`; anything else is the output file itself, and its
/// extension picks the target unless one is given.
pub fn resolve_output(
    destination: &Path,
    source: &Path,
    target: Option<Target>,
) -> Result<OutputPath, OptgenError> {
    let (path, target) = if destination.is_dir() {
        let target = target.unwrap_or_default();
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".into());
        (destination.join(format!("{stem}.{}", target.extension())), target)
    } else {
        let target = target.unwrap_or_else(|| Target::infer(destination));
        (destination.to_path_buf(), target)
    };

    let dir = parent_dir(&path);
    if !dir.is_dir() {
        return Err(OptgenError::OutputDirMissing(dir));
    }
    Ok(OutputPath { path, target })
}

/// Write `path` atomically with the bytes produced by `write`.
///
/// Without `overwrite`, an existing destination is
/// [`OptgenError::DestinationExists`]; the final rename uses
/// `persist_noclobber` so a file appearing mid-run is not replaced either.
pub fn write_atomic<F>(path: &Path, overwrite: bool, write: F) -> Result<(), OptgenError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> io::Result<()>,
{
    if !overwrite && path.exists() {
        return Err(OptgenError::DestinationExists(path.to_path_buf()));
    }

    let dir = parent_dir(path);
    let io_err = |source: io::Error| OptgenError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| OptgenError::Io {
        path: dir.clone(),
        source,
    })?;
    debug!("Writing {} via {}", path.display(), tmp.path().display());

    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        write(&mut out).map_err(io_err)?;
        out.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    readable_by_all(&tmp).map_err(io_err)?;

    let persisted = if overwrite {
        tmp.persist(path)
    } else {
        tmp.persist_noclobber(path)
    };
    match persisted {
        Ok(_) => Ok(()),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            Err(OptgenError::DestinationExists(path.to_path_buf()))
        }
        Err(e) => Err(io_err(e.error)),
    }
}

/// Temporary files are created owner-only; generated sources should not be.
#[cfg(unix)]
fn readable_by_all(tmp: &NamedTempFile) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tmp.as_file()
        .set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn readable_by_all(_tmp: &NamedTempFile) -> io::Result<()> {
    Ok(())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
