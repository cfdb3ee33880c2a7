//! Source archive extraction.

use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unsafe path in archive: {0}")]
    UnsafePath(PathBuf),

    #[error("Archive is empty")]
    Empty,
}

/// Unpack an in-memory `.tar.gz` into `dest_dir`.
///
/// Returns the source root: the single top-level directory if the archive
/// has one (as GitHub tag tarballs do), otherwise `dest_dir` itself.
///
/// # Errors
///
/// Fails on corrupt archives, entries escaping `dest_dir`, or archives
/// without any entries.
pub fn extract_tar_gz(bytes: &[u8], dest_dir: &Path) -> Result<PathBuf, ExtractError> {
    let decoder = flate2::read::GzDecoder::new(bytes);
    extract_tar(decoder, dest_dir)?;
    source_root(dest_dir)
}

fn extract_tar<R: Read>(reader: R, dest_dir: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    let mut count = 0usize;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let relative: PathBuf = entry.path()?.into_owned();

        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ExtractError::UnsafePath(relative));
        }

        // pax_global_header and friends carry metadata only
        let kind = entry.header().entry_type();
        if kind.is_pax_global_extensions() || kind.is_pax_local_extensions() {
            continue;
        }

        let absolute = dest_dir.join(&relative);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&absolute)?;
        count += 1;
    }

    if count == 0 {
        return Err(ExtractError::Empty);
    }
    Ok(())
}

fn source_root(dest_dir: &Path) -> Result<PathBuf, ExtractError> {
    let entries: Vec<_> = fs::read_dir(dest_dir)?.collect::<Result<_, _>>()?;
    match entries.as_slice() {
        [only] if only.file_type()?.is_dir() => Ok(only.path()),
        _ => Ok(dest_dir.to_path_buf()),
    }
}
