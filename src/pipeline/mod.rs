//! # Ingestion Pipeline
//!
//! Each dataset walks `Resolving → Staging → Archiving → SchemaSync → Loading → Done`.
//! Any failing stage moves the dataset to `Aborted`; the remaining datasets of the
//! batch run regardless.
use crate::config::{DatasetConfig, Settings};
use crate::database::loader::{load, LoadRequest, Provenance};
use crate::database::schema::ensure_schema;
use crate::database::store::Store;
use crate::error::IngestError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, info_span, warn};

pub mod archive;
pub mod path;
pub mod stage;

use archive::archive;
use path::resolve_path;
use stage::stage;

/// Filesystem locations used while processing datasets.
#[derive(Clone, Debug)]
pub struct Workspace {
    pub staging_dir: PathBuf,
    pub archive_root: PathBuf,
    pub remove_staged: bool,
}

impl From<&Settings> for Workspace {
    fn from(settings: &Settings) -> Self {
        Self {
            staging_dir: settings.staging_dir.to_owned(),
            archive_root: settings.archive_root.to_owned(),
            remove_staged: settings.remove_staged,
        }
    }
}

/// State shared by every dataset of one run. "Today" and the provenance stamp are fixed
/// when the context is created.
pub struct RunContext {
    pub workspace: Workspace,
    pub store: Store,
    pub today: NaiveDate,
    pub provenance: Provenance,
}

impl RunContext {
    pub fn new(workspace: Workspace, store: Store, today: NaiveDate, timestamp: DateTime<FixedOffset>) -> Self {
        Self {
            workspace,
            store,
            today,
            provenance: Provenance::new(today, timestamp),
        }
    }

    /// Releases the table store.
    pub fn close(self) -> duckdb::Result<()> {
        self.store.close()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Staging,
    Archiving,
    SchemaSync,
    Loading,
    Done,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolving => "resolving",
            Self::Staging => "staging",
            Self::Archiving => "archiving",
            Self::SchemaSync => "schema sync",
            Self::Loading => "loading",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Outcome of one dataset.
#[derive(Debug)]
pub struct DatasetReport {
    pub dataset: String,
    /// `Done` or `Aborted`
    pub state: Stage,
    /// Last stage entered; the failing stage when aborted
    pub reached: Stage,
    pub rows: usize,
    pub failure: Option<IngestError>,
}

impl DatasetReport {
    pub fn is_done(&self) -> bool {
        self.state == Stage::Done
    }

    /// Aborted because today's archive already holds the same content.
    pub fn is_duplicate(&self) -> bool {
        matches!(&self.failure, Some(IngestError::ArchiveError(error)) if error.is_duplicate())
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<DatasetReport>,
}

impl RunSummary {
    pub fn done(&self) -> usize {
        self.reports.iter().filter(|report| report.is_done()).count()
    }

    pub fn aborted(&self) -> usize {
        self.reports.len() - self.done()
    }

    pub fn duplicates(&self) -> usize {
        self.reports.iter().filter(|report| report.is_duplicate()).count()
    }

    pub fn rows(&self) -> usize {
        self.reports.iter().map(|report| report.rows).sum()
    }
}

/// Per-dataset values produced by earlier stages.
struct DatasetRun<'a> {
    dataset: &'a DatasetConfig,
    source: PathBuf,
    staged: PathBuf,
    rows: usize,
}

impl DatasetRun<'_> {
    /// Performs `current` and returns the next stage.
    fn advance(&mut self, context: &mut RunContext, current: Stage) -> Result<Stage, IngestError> {
        let dataset = self.dataset;
        match current {
            Stage::Resolving => {
                self.source = PathBuf::from(resolve_path(&dataset.file_path_template, context.today));
                debug!(path = %self.source.display(), "resolved source path");
                Ok(Stage::Staging)
            }
            Stage::Staging => {
                self.staged = stage(&self.source, &context.workspace.staging_dir, &dataset.store_name)?;
                Ok(Stage::Archiving)
            }
            Stage::Archiving => {
                if dataset.archive_enabled {
                    archive(
                        &self.staged,
                        &context.workspace.archive_root,
                        context.today,
                        &dataset.store_name,
                    )?;
                } else {
                    debug!("archiving disabled");
                }
                Ok(Stage::SchemaSync)
            }
            Stage::SchemaSync => {
                if !dataset.load_enabled {
                    warn!("loading disabled");
                    return Ok(Stage::Done);
                }
                ensure_schema(&context.store, &dataset.table_name, &dataset.columns)?;
                Ok(Stage::Loading)
            }
            Stage::Loading => {
                let request = LoadRequest {
                    staged_file: &self.staged,
                    sheet_name: &dataset.sheet_name,
                    header_row_offset: dataset.header_row_offset,
                    row_limit: dataset.row_limit,
                    columns: &dataset.columns,
                    table_name: &dataset.table_name,
                };
                self.rows = load(&mut context.store, &request, &context.provenance)?;
                Ok(Stage::Done)
            }
            Stage::Done | Stage::Aborted => Ok(current),
        }
    }
}

/// Runs one dataset to `Done` or `Aborted`. Never fails; the failure is part of the report.
pub fn run_dataset(context: &mut RunContext, dataset: &DatasetConfig) -> DatasetReport {
    let span = info_span!("dataset", name = %dataset.name);
    let _guard = span.enter();
    info!(table = %dataset.table_name, "begin processing");

    let mut run = DatasetRun {
        dataset,
        source: PathBuf::new(),
        staged: PathBuf::new(),
        rows: 0,
    };
    let mut current = Stage::Resolving;
    let mut failure = None;
    while !matches!(current, Stage::Done | Stage::Aborted) {
        match run.advance(context, current) {
            Ok(next) => current = next,
            Err(cause) => {
                if matches!(&cause, IngestError::ArchiveError(error) if error.is_duplicate()) {
                    warn!(stage = %current, "{cause}");
                } else {
                    error!(stage = %current, "{cause}");
                }
                failure = Some((current, cause));
                break;
            }
        }
    }

    let report = match failure {
        Some((reached, cause)) => DatasetReport {
            dataset: dataset.name.to_owned(),
            state: Stage::Aborted,
            reached,
            rows: 0,
            failure: Some(cause),
        },
        None => DatasetReport {
            dataset: dataset.name.to_owned(),
            state: Stage::Done,
            reached: Stage::Done,
            rows: run.rows,
            failure: None,
        },
    };

    if let Err(error) = cleanup(&context.workspace, &dataset.store_name) {
        warn!("cleanup failed: {error}");
    }
    info!(state = %report.state, rows = report.rows, "finished processing");
    report
}

/// Runs every dataset in order; each one is independent of the others.
pub fn run_all(context: &mut RunContext, datasets: &[DatasetConfig]) -> RunSummary {
    let reports = datasets
        .iter()
        .map(|dataset| run_dataset(context, dataset))
        .collect();
    RunSummary { reports }
}

/// Removes the staged copy when the workspace asks for it.
pub fn cleanup(workspace: &Workspace, store_name: &str) -> io::Result<()> {
    if !workspace.remove_staged {
        debug!("keeping staged file");
        return Ok(());
    }
    let staged = workspace.staging_dir.join(store_name);
    match fs::remove_file(&staged) {
        Ok(()) => {
            debug!(path = %staged.display(), "removed staged file");
            Ok(())
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}
