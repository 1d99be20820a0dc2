//! # Spreadsheet Ingestion
//!
//! Ingests periodic spreadsheet extracts from a file share into a DuckDB table store,
//! keeping a dated archive copy of every distinct extract.
//!
//! ## Pipeline
//!
//! For every configured dataset, in order:
//!
//! - **Resolve** the date tokens of the source path template (`$(YEAR)`, `$(YEAR_DIGIT)`,
//!   `$(WEEK)`, `$(MONTH)`, `$(DAY)`)
//! - **Stage** the source file into the working directory under its store name
//! - **Archive** the staged file into `<archive_root>/<YYYY-MM-DD>/`, unless today's entry
//!   already has the same SHA-256 checksum
//! - **Sync** the destination table schema; declared columns are added, never dropped
//! - **Load** the rows of the configured sheet, stamped with the ingestion date and timestamp,
//!   in a single transaction
//!
//! A failing stage aborts only its own dataset.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration and validation
//! - [`spreadsheet`]: `.xlsx` reader built on `zip` and `quick-xml`
//! - [`database`]: column types, the DuckDB store, schema evolution and the row loader
//! - [`pipeline`]: the per-dataset state machine and batch runner
pub mod config;
pub mod database;
pub mod error;
mod helpers;
pub mod pipeline;
pub mod spreadsheet;

pub use config::{Config, DatasetConfig, Settings};
pub use error::IngestError;
pub use pipeline::{run_all, run_dataset, RunContext, RunSummary, Workspace};
