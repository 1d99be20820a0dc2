use thiserror::Error;

/// Main error type for the ingestion pipeline.
/// Aggregates errors from the standard library, dependencies and every pipeline stage.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    // Third-party library errors
    #[error("{0}")]
    DuckDBError(#[from] duckdb::Error),

    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    YamlError(#[from] serde_yaml::Error),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    // Configuration errors
    #[error("{0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("{0}")]
    ColumnError(#[from] crate::database::column::ColumnError),

    // Pipeline stage errors
    #[error("{0}")]
    StageError(#[from] crate::pipeline::stage::StageError),

    #[error("{0}")]
    ArchiveError(#[from] crate::pipeline::archive::ArchiveError),

    #[error("{0}")]
    SchemaError(#[from] crate::database::schema::SchemaError),

    #[error("{0}")]
    LoadError(#[from] crate::database::loader::LoadError),
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, IngestError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| IngestError::WithContextError(format!("{}: {}", message, e)))
    }
}
