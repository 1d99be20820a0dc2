//! YAML configuration: run settings plus the ordered list of datasets.
//!
//! The file is parsed into raw records and validated once; the rest of the crate
//! only ever sees the typed [`Config`].

use crate::database::column::{normalize_name, ColumnSpec, ColumnType};
use crate::database::{PROVENANCE_DATE, PROVENANCE_DATETIME};
use serde::Deserialize;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const WORKBOOK_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xlam"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Dataset #{index}: {message}")]
    InvalidDataset { index: usize, message: String },
}

/// Directories and files shared by every dataset of a run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Working area receiving staged copies
    pub staging_dir: PathBuf,
    /// Root of the dated archive directories
    pub archive_root: PathBuf,
    /// DuckDB database file
    pub database: PathBuf,
    /// Delete staged copies once a dataset finishes
    pub remove_staged: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("tmp"),
            archive_root: PathBuf::from("db"),
            database: PathBuf::from("db/ingest.duckdb"),
            remove_staged: false,
        }
    }
}

impl Settings {
    /// Creates the staging directory, the archive root and the database's parent directory.
    pub fn bootstrap(&self) -> io::Result<()> {
        let database_dir = self.database.parent().filter(|parent| !parent.as_os_str().is_empty());
        for dir in [Some(self.staging_dir.as_path()), Some(self.archive_root.as_path()), database_dir]
            .into_iter()
            .flatten()
        {
            fs::create_dir_all(dir)?;
            debug!(dir = %dir.display(), "directory ready");
        }
        Ok(())
    }
}

/// A validated dataset. Never mutated once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetConfig {
    /// Identity used in logs and reports
    pub name: String,
    pub file_path_template: String,
    pub sheet_name: String,
    pub header_row_offset: usize,
    pub row_limit: Option<usize>,
    pub columns: Vec<ColumnSpec>,
    pub store_name: String,
    /// Normalized destination table
    pub table_name: String,
    pub load_enabled: bool,
    pub archive_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub settings: Settings,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    datasets: Vec<RawDataset>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDataset {
    name: Option<String>,
    file_path_template: String,
    sheet_name: String,
    #[serde(default)]
    header_row_offset: usize,
    row_limit: Option<usize>,
    #[serde(default)]
    columns: Vec<RawColumn>,
    store_name: String,
    table_name: String,
    #[serde(default = "enabled")]
    load_enabled: bool,
    #[serde(default = "enabled")]
    archive_enabled: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawColumn {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

fn enabled() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(yaml)?;
        let datasets = raw
            .datasets
            .into_iter()
            .enumerate()
            .map(|(index, dataset)| {
                validate_dataset(dataset).map_err(|message| ConfigError::InvalidDataset { index, message })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            settings: raw.settings,
            datasets,
        })
    }
}

fn validate_dataset(raw: RawDataset) -> Result<DatasetConfig, String> {
    if raw.file_path_template.trim().is_empty() {
        return Err("file_path_template is empty".to_owned());
    }
    if raw.sheet_name.is_empty() {
        return Err("sheet_name is empty".to_owned());
    }
    validate_store_name(&raw.store_name)?;

    let table_name = normalize_name(&raw.table_name);
    if table_name.is_empty() {
        return Err(format!("table_name '{}' has no usable characters", raw.table_name));
    }

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(raw.columns.len());
    for column in raw.columns {
        let kind = ColumnType::parse(&column.kind).map_err(|e| format!("column '{}': {e}", column.name))?;
        let declared = ColumnSpec::new(&column.name, kind);
        let lowered = declared.name.to_ascii_lowercase();
        if lowered.is_empty() {
            return Err(format!("column '{}' has no usable characters", column.name));
        }
        if lowered == PROVENANCE_DATE || lowered == PROVENANCE_DATETIME {
            return Err(format!("column '{}' collides with a provenance column", column.name));
        }
        if !seen.insert(lowered) {
            return Err(format!("column '{}' is declared twice", declared.name));
        }
        columns.push(declared);
    }

    Ok(DatasetConfig {
        name: raw
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| raw.store_name.to_owned()),
        file_path_template: raw.file_path_template,
        sheet_name: raw.sheet_name,
        header_row_offset: raw.header_row_offset,
        row_limit: raw.row_limit,
        columns,
        store_name: raw.store_name,
        table_name,
        load_enabled: raw.load_enabled,
        archive_enabled: raw.archive_enabled,
    })
}

/// A store name is a bare workbook file name.
fn validate_store_name(store_name: &str) -> Result<(), String> {
    if store_name.trim().is_empty() {
        return Err("store_name is empty".to_owned());
    }
    if store_name.contains(['/', '\\']) || store_name == "." || store_name == ".." {
        return Err(format!("store_name '{store_name}' must be a plain file name"));
    }
    let extension = Path::new(store_name)
        .extension()
        .and_then(OsStr::to_str)
        .map(|extension| extension.to_ascii_lowercase());
    match extension {
        Some(extension) if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) => Ok(()),
        _ => Err(format!(
            "store_name '{store_name}' must end with one of: {}",
            WORKBOOK_EXTENSIONS.join(", ")
        )),
    }
}
