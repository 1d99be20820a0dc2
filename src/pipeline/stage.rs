use chrono::{DateTime, Local};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Cannot inspect source '{}': {source}", .path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot stage '{}': {source}", .path.display())]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Copies `source` into `staging_dir` as `store_name`, replacing any earlier staged copy.
///
/// Returns the staged path. A missing or unreadable source fails without touching the staging area.
pub fn stage(source: &Path, staging_dir: &Path, store_name: &str) -> Result<PathBuf, StageError> {
    let metadata = match fs::metadata(source) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(StageError::SourceNotFound(source.to_path_buf())),
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Err(StageError::SourceNotFound(source.to_path_buf()))
        }
        Err(error) => {
            return Err(StageError::Inspect {
                path: source.to_path_buf(),
                source: error,
            })
        }
    };
    match metadata.modified() {
        Ok(modified) => info!(
            path = %source.display(),
            modified = %DateTime::<Local>::from(modified).format("%Y-%m-%d %H:%M:%S"),
            "found source file"
        ),
        Err(_) => info!(path = %source.display(), "found source file"),
    }

    let staged = staging_dir.join(store_name);
    let copied = fs::copy(source, &staged).map_err(|source| StageError::Copy {
        path: staged.to_owned(),
        source,
    })?;
    debug!(path = %staged.display(), bytes = copied, "staged");
    Ok(staged)
}
