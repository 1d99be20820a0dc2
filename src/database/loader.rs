use crate::database::column::{normalize_name, quote, ColumnSpec};
use crate::database::store::Store;
use crate::database::{PROVENANCE_DATE, PROVENANCE_DATETIME};
use crate::error::IngestError;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::{open_workbook, Sheet, SpreadsheetError};
use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone};
use duckdb::params_from_iter;
use duckdb::types::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Sheet '{sheet}' not found in '{file}'")]
    SheetNotFound { file: String, sheet: String },

    #[error("Header row {0} is past the end of the sheet")]
    HeaderRowMissing(usize),

    #[error("Column '{0}' not found in header row")]
    ColumnMissing(String),

    #[error("Cannot parse cell {reference} for column '{column}': {message}")]
    RowParseError {
        reference: String,
        column: String,
        message: String,
    },

    #[error("Cannot read workbook: {0}")]
    Unreadable(Box<IngestError>),

    #[error("Store rejected insert: {0}")]
    Store(#[from] duckdb::Error),
}

/// Everything the loader needs to know about one dataset.
#[derive(Debug)]
pub struct LoadRequest<'a> {
    pub staged_file: &'a Path,
    pub sheet_name: &'a str,
    /// Physical rows to skip before the header row
    pub header_row_offset: usize,
    /// Maximum number of physical rows read after the header
    pub row_limit: Option<usize>,
    pub columns: &'a [ColumnSpec],
    pub table_name: &'a str,
}

/// Ingestion date and timestamp stamped on every row of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Provenance {
    pub date: String,
    pub datetime: String,
}

impl Provenance {
    /// The timestamp is moved onto `date`, keeping its time of day and offset.
    pub fn new(date: NaiveDate, timestamp: DateTime<FixedOffset>) -> Self {
        let timestamp = timestamp
            .offset()
            .from_local_datetime(&date.and_time(timestamp.time()))
            .single()
            .unwrap_or(timestamp);
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            datetime: timestamp.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

/// Loads the data rows of the requested sheet into `table_name`.
///
/// Every row is converted before anything is written, and all inserts share one
/// transaction, so any failure leaves the table as it was. Returns the number of rows inserted.
pub fn load(store: &mut Store, request: &LoadRequest, provenance: &Provenance) -> Result<usize, LoadError> {
    let sheet = read_sheet(request)?;
    let header_row = request.header_row_offset;
    let header = sheet
        .header(header_row)
        .map_err(|_| LoadError::HeaderRowMissing(header_row.saturating_add(1)))?;

    let mut positions = HashMap::<String, usize>::new();
    for (col, label) in header.iter().enumerate() {
        if let Some(label) = label {
            positions.entry(normalize_name(label)).or_insert(col);
        }
    }
    let indexes = request
        .columns
        .iter()
        .map(|column| {
            positions
                .get(&column.name)
                .copied()
                .ok_or_else(|| LoadError::ColumnMissing(column.label.to_owned()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rows = sheet
        .data_rows(header_row, request.row_limit)
        .into_iter()
        .map(|row| record_values(&sheet, row, request.columns, &indexes, provenance))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        table = request.table_name,
        rows = rows.len(),
        "validated rows"
    );

    let sql = insert_statement(request.table_name, request.columns);
    let transaction = store.connection_mut().transaction()?;
    {
        let mut statement = transaction.prepare(&sql)?;
        for values in &rows {
            statement.execute(params_from_iter(values))?;
        }
    }
    transaction.commit()?;

    info!(table = request.table_name, rows = rows.len(), "loaded rows");
    Ok(rows.len())
}

fn read_sheet(request: &LoadRequest) -> Result<Sheet, LoadError> {
    let mut workbook = open_workbook(request.staged_file).map_err(|error| LoadError::Unreadable(Box::new(error)))?;
    workbook.read_sheet(request.sheet_name).map_err(|error| match error {
        IngestError::SpreadsheetError(SpreadsheetError::SheetNotFound(file, sheet)) => {
            LoadError::SheetNotFound { file, sheet }
        }
        error => LoadError::Unreadable(Box::new(error)),
    })
}

fn record_values(
    sheet: &Sheet,
    row: usize,
    columns: &[ColumnSpec],
    indexes: &[usize],
    provenance: &Provenance,
) -> Result<Vec<Value>, LoadError> {
    let mut values = Vec::with_capacity(columns.len() + 2);
    for (column, &col) in columns.iter().zip(indexes) {
        let value = column
            .kind
            .to_value(sheet.get(row, col))
            .map_err(|message| LoadError::RowParseError {
                reference: index_to_reference(row, col),
                column: column.label.to_owned(),
                message,
            })?;
        values.push(value);
    }
    values.push(Value::Text(provenance.date.to_owned()));
    values.push(Value::Text(provenance.datetime.to_owned()));
    Ok(values)
}

fn insert_statement(table: &str, columns: &[ColumnSpec]) -> String {
    let mut names = Vec::with_capacity(columns.len() + 2);
    let mut placeholders = Vec::with_capacity(columns.len() + 2);
    for column in columns {
        names.push(quote(&column.name));
        placeholders.push(format!("CAST(? AS {})", column.kind.as_sql()));
    }
    for provenance in [PROVENANCE_DATE, PROVENANCE_DATETIME] {
        names.push(quote(provenance));
        placeholders.push("CAST(? AS VARCHAR)".to_owned());
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        names.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::column::ColumnType;
    use crate::database::schema::ensure_schema;
    use crate::spreadsheet::fixtures::{write_workbook, FixtureCell};
    use tempfile::TempDir;

    fn provenance() -> Provenance {
        let offset = FixedOffset::east_opt(3600).unwrap();
        Provenance::new(
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            offset.with_ymd_and_hms(2024, 3, 15, 8, 30, 0).unwrap(),
        )
    }

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("Name", ColumnType::Varchar),
            ColumnSpec::new("Amount", ColumnType::BigInt),
            ColumnSpec::new("Booked On", ColumnType::Date),
        ]
    }

    fn workbook(rows: Vec<Vec<FixtureCell>>) -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.xlsx");
        write_workbook(&path, &[("Other", vec![]), ("Data", rows)]).unwrap();
        (dir, path)
    }

    fn header() -> Vec<FixtureCell<'static>> {
        vec![
            FixtureCell::Shared("Name"),
            FixtureCell::Inline(" Amount "),
            FixtureCell::Shared("Booked On"),
            FixtureCell::Inline("Ignored"),
        ]
    }

    fn request<'a>(path: &'a Path, columns: &'a [ColumnSpec]) -> LoadRequest<'a> {
        LoadRequest {
            staged_file: path,
            sheet_name: "Data",
            header_row_offset: 0,
            row_limit: None,
            columns,
            table_name: "my_table",
        }
    }

    fn prepared_store(columns: &[ColumnSpec]) -> Store {
        let store = Store::open_in_memory().unwrap();
        ensure_schema(&store, "my_table", columns).unwrap();
        store
    }

    #[test]
    fn inserts_every_row_with_one_stamp() {
        let (_dir, path) = workbook(vec![
            header(),
            vec![FixtureCell::Shared("a"), FixtureCell::Number("1"), FixtureCell::Date(45366)],
            vec![FixtureCell::Shared("b"), FixtureCell::Number("2"), FixtureCell::Inline("2024-03-16")],
            vec![FixtureCell::Shared("c"), FixtureCell::Number("3"), FixtureCell::Date(45368)],
        ]);
        let columns = columns();
        let mut store = prepared_store(&columns);

        let rows = load(&mut store, &request(&path, &columns), &provenance()).unwrap();
        assert_eq!(rows, 3);
        assert_eq!(store.row_count("my_table").unwrap(), 3);

        let (stamps, date, datetime): (i64, String, String) = store
            .connection()
            .query_row(
                r#"SELECT count(DISTINCT "date"), min("date"), min("datetime") FROM my_table"#,
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(stamps, 1);
        assert_eq!(date, "2024-03-15");
        assert_eq!(datetime, "2024-03-15T08:30:00+01:00");

        let total: i64 = store
            .connection()
            .query_row(r#"SELECT sum("Amount")::BIGINT FROM my_table"#, [], |row| row.get(0))
            .unwrap();
        assert_eq!(total, 6);
        let booked: String = store
            .connection()
            .query_row(
                r#"SELECT strftime(max("Booked_On"), '%Y-%m-%d') FROM my_table"#,
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(booked, "2024-03-17");
    }

    #[test]
    fn stamp_follows_the_run_date() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let provenance = Provenance::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            offset.with_ymd_and_hms(2026, 10, 18, 14, 5, 9).unwrap(),
        );
        assert_eq!(provenance.date, "2024-01-02");
        assert_eq!(provenance.datetime, "2024-01-02T14:05:09-05:00");
    }

    #[test]
    fn missing_column_inserts_nothing() {
        let (_dir, path) = workbook(vec![
            vec![FixtureCell::Shared("Name"), FixtureCell::Inline("Amount")],
            vec![FixtureCell::Shared("a"), FixtureCell::Number("1")],
        ]);
        let columns = columns();
        let mut store = prepared_store(&columns);

        let error = load(&mut store, &request(&path, &columns), &provenance()).unwrap_err();
        assert!(matches!(error, LoadError::ColumnMissing(ref name) if name == "Booked On"));
        assert_eq!(store.row_count("my_table").unwrap(), 0);
    }

    #[test]
    fn parse_error_rolls_back_the_batch() {
        let (_dir, path) = workbook(vec![
            header(),
            vec![FixtureCell::Shared("a"), FixtureCell::Number("1"), FixtureCell::Date(45366)],
            vec![FixtureCell::Shared("b"), FixtureCell::Inline("lots"), FixtureCell::Date(45366)],
        ]);
        let columns = columns();
        let mut store = prepared_store(&columns);

        let error = load(&mut store, &request(&path, &columns), &provenance()).unwrap_err();
        assert!(matches!(
            error,
            LoadError::RowParseError { ref reference, ref column, .. } if reference == "B3" && column == "Amount"
        ));
        assert_eq!(store.row_count("my_table").unwrap(), 0);
    }

    #[test]
    fn unknown_sheet() {
        let (_dir, path) = workbook(vec![header()]);
        let columns = columns();
        let mut store = prepared_store(&columns);
        let mut request = request(&path, &columns);
        request.sheet_name = "Summary";

        let error = load(&mut store, &request, &provenance()).unwrap_err();
        assert!(matches!(error, LoadError::SheetNotFound { ref sheet, .. } if sheet == "Summary"));
    }

    #[test]
    fn header_offset_limit_and_defaults() {
        let (_dir, path) = workbook(vec![
            vec![FixtureCell::Inline("Weekly report")],
            header(),
            vec![FixtureCell::Blank, FixtureCell::Blank, FixtureCell::Date(45366), FixtureCell::Inline("x")],
            vec![],
            vec![FixtureCell::Shared("d"), FixtureCell::Number("4"), FixtureCell::Blank],
            vec![FixtureCell::Shared("e"), FixtureCell::Number("5"), FixtureCell::Blank],
        ]);
        let columns = columns();
        let mut store = prepared_store(&columns);
        let mut request = request(&path, &columns);
        request.header_row_offset = 1;
        request.row_limit = Some(3);

        let rows = load(&mut store, &request, &provenance()).unwrap();
        assert_eq!(rows, 2);

        let mut statement = store
            .connection()
            .prepare(r#"SELECT "Name", "Amount" FROM my_table ORDER BY "Name""#)
            .unwrap();
        let values = statement
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?)))
            .unwrap()
            .collect::<duckdb::Result<Vec<_>>>()
            .unwrap();
        assert_eq!(values, vec![("".to_owned(), None), ("d".to_owned(), Some(4))]);
    }

    #[test]
    fn header_past_end_of_sheet() {
        let (_dir, path) = workbook(vec![header()]);
        let columns = columns();
        let mut store = prepared_store(&columns);
        let mut request = request(&path, &columns);
        request.header_row_offset = 5;

        let error = load(&mut store, &request, &provenance()).unwrap_err();
        assert!(matches!(error, LoadError::HeaderRowMissing(6)));

        request.header_row_offset = usize::MAX;
        let error = load(&mut store, &request, &provenance()).unwrap_err();
        assert!(matches!(error, LoadError::HeaderRowMissing(usize::MAX)));
        assert_eq!(store.row_count("my_table").unwrap(), 0);
    }
}
