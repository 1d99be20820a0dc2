use crate::spreadsheet::cell::Cell;
use duckdb::types::Value;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static NON_PORTABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("Hardcode regex pattern"));

/// Errors related to column type parsing and validation.
#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("Invalid column type '{0}'")]
    TypeError(String),
}

/// Storage types a dataset may declare for its columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    BigInt,
    Double,
    Varchar,
    Timestamp,
    Date,
    Time,
}

impl ColumnType {
    /// Parses a declared column type. Supports various aliases for each type.
    pub fn parse(name: &str) -> Result<Self, ColumnError> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => Ok(Self::Boolean),
            "INT" | "BIGINT" | "INTEGER" => Ok(Self::BigInt),
            "FLOAT" | "DOUBLE" | "REAL" | "DECIMAL" | "NUMERIC" => Ok(Self::Double),
            "TEXT" | "STRING" | "VARCHAR" => Ok(Self::Varchar),
            "DATETIME" | "TIMESTAMP" => Ok(Self::Timestamp),
            "DATE" => Ok(Self::Date),
            "TIME" => Ok(Self::Time),
            _ => Err(ColumnError::TypeError(name.to_string())),
        }
    }

    /// SQL type used in DDL.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::BigInt => "BIGINT",
            Self::Double => "DOUBLE",
            Self::Varchar => "VARCHAR",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Time => "TIME",
        }
    }

    /// Default clause for a newly added column. Only text columns can hold `''`.
    pub const fn default_clause(&self) -> &'static str {
        match self {
            Self::Varchar => " DEFAULT ''",
            _ => "",
        }
    }

    /// Converts a cell to the value bound for this column.
    ///
    /// Absent or blank cells become `''` in text columns and NULL elsewhere.
    /// Temporal values are bound in ISO form and cast by the store.
    pub fn to_value(&self, cell: Option<&Cell>) -> Result<Value, String> {
        let cell = match cell.filter(|cell| !cell.is_blank()) {
            Some(cell) => cell,
            None if *self == Self::Varchar => return Ok(Value::Text(String::new())),
            None => return Ok(Value::Null),
        };
        let value = match self {
            Self::Varchar => Value::Text(cell.to_text()),
            Self::Boolean => Value::Boolean(cell.to_boolean()?),
            Self::BigInt => Value::BigInt(cell.to_bigint()?),
            Self::Double => Value::Double(cell.to_double()?),
            Self::Date => Value::Text(cell.to_date()?.format("%Y-%m-%d").to_string()),
            Self::Time => Value::Text(cell.to_time()?.format("%H:%M:%S%.6f").to_string()),
            Self::Timestamp => Value::Text(cell.to_datetime()?.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
        };
        Ok(value)
    }
}

/// A declared column: the configured label, its identifier form and its type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Label as written in the configuration
    pub label: String,
    /// Normalized identifier used in the table and to match header labels
    pub name: String,
    pub kind: ColumnType,
}

impl ColumnSpec {
    pub fn new(label: &str, kind: ColumnType) -> Self {
        Self {
            label: label.to_owned(),
            name: normalize_name(label),
            kind,
        }
    }
}

/// Normalizes a label to an identifier: trimmed, spaces replaced with underscores,
/// everything outside `[A-Za-z0-9_]` removed.
pub fn normalize_name(label: &str) -> String {
    let underscored = label.trim().replace(' ', "_");
    NON_PORTABLE.replace_all(&underscored, "").into_owned()
}

/// Double-quotes an identifier that has already been normalized.
pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}
