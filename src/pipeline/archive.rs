use crate::helpers::checksum::{file_checksum, optional_file_checksum};
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("'{store_name}' is identical to the copy archived in '{}'", .dir.display())]
    Duplicate { store_name: String, dir: PathBuf },

    #[error("Cannot archive '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}

/// Directory holding the archive entries of `date`.
pub fn archive_dir(archive_root: &Path, date: NaiveDate) -> PathBuf {
    archive_root.join(date.format("%Y-%m-%d").to_string())
}

/// Copies the staged file into today's archive directory unless the entry already
/// there has the same content, in which case nothing is written and `Duplicate` is returned.
pub fn archive(
    staged: &Path,
    archive_root: &Path,
    today: NaiveDate,
    store_name: &str,
) -> Result<PathBuf, ArchiveError> {
    let dir = archive_dir(archive_root, today);
    fs::create_dir_all(&dir).map_err(io_error(&dir))?;

    let entry = dir.join(store_name);
    let staged_checksum = file_checksum(staged).map_err(io_error(staged))?;
    let archived_checksum = optional_file_checksum(&entry).map_err(io_error(&entry))?;
    debug!(staged = %staged_checksum, archived = ?archived_checksum, "compared checksums");
    if archived_checksum.as_deref() == Some(staged_checksum.as_str()) {
        return Err(ArchiveError::Duplicate {
            store_name: store_name.to_owned(),
            dir,
        });
    }

    fs::copy(staged, &entry).map_err(io_error(&entry))?;
    info!(path = %entry.display(), "archived");
    Ok(entry)
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
}
