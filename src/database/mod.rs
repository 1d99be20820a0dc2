//! # Table Store
//!
//! The DuckDB side of ingestion: declared column types, the owned connection,
//! additive schema evolution and the transactional row loader.
pub mod column;
pub mod loader;
pub mod schema;
pub mod store;

pub use column::{ColumnSpec, ColumnType};
pub use store::Store;

/// Ingestion date column, `YYYY-MM-DD`.
pub const PROVENANCE_DATE: &str = "date";
/// Ingestion timestamp column, RFC 3339.
pub const PROVENANCE_DATETIME: &str = "datetime";
