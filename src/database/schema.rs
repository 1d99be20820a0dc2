use crate::database::column::{normalize_name, quote, ColumnSpec};
use crate::database::store::Store;
use crate::database::{PROVENANCE_DATE, PROVENANCE_DATETIME};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Store rejected schema change on table '{table}': {source}")]
    Rejected {
        table: String,
        #[source]
        source: duckdb::Error,
    },
}

/// What `ensure_schema` changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SchemaChanges {
    pub created: bool,
    pub added: Vec<String>,
}

impl SchemaChanges {
    pub fn is_empty(&self) -> bool {
        !self.created && self.added.is_empty()
    }
}

/// Makes sure `table` exists and carries every declared column.
///
/// A new table starts with the two provenance columns. Missing declared columns are
/// appended; existing columns are never reordered, dropped or retyped.
pub fn ensure_schema(store: &Store, table: &str, columns: &[ColumnSpec]) -> Result<SchemaChanges, SchemaError> {
    if !is_identifier(table) {
        return Err(SchemaError::InvalidIdentifier(table.to_owned()));
    }
    if let Some(column) = columns.iter().find(|column| !is_identifier(&column.name)) {
        return Err(SchemaError::InvalidIdentifier(column.label.to_owned()));
    }
    let rejected = |source| SchemaError::Rejected {
        table: table.to_owned(),
        source,
    };

    let mut changes = SchemaChanges::default();
    if !store.table_exists(table).map_err(rejected)? {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR, {} VARCHAR)",
            quote(table),
            quote(PROVENANCE_DATE),
            quote(PROVENANCE_DATETIME)
        );
        store.connection().execute_batch(&sql).map_err(rejected)?;
        info!(table, "created table");
        changes.created = true;
    }

    let mut existing: Vec<String> = store
        .table_columns(table)
        .map_err(rejected)?
        .into_iter()
        .map(|name| name.to_ascii_lowercase())
        .collect();
    for column in columns {
        let lowered = column.name.to_ascii_lowercase();
        if existing.contains(&lowered) {
            continue;
        }
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}{}",
            quote(table),
            quote(&column.name),
            column.kind.as_sql(),
            column.kind.default_clause()
        );
        debug!(table, %sql, "adding column");
        store.connection().execute_batch(&sql).map_err(rejected)?;
        info!(table, column = %column.name, kind = column.kind.as_sql(), "added column");
        existing.push(lowered);
        changes.added.push(column.name.to_owned());
    }
    Ok(changes)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && normalize_name(name) == name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::column::ColumnType;

    fn columns() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("Column A", ColumnType::Varchar),
            ColumnSpec::new("Amount", ColumnType::Double),
        ]
    }

    #[test]
    fn creates_table_with_provenance_and_declared_columns() {
        let store = Store::open_in_memory().unwrap();
        let changes = ensure_schema(&store, "my_table", &columns()).unwrap();

        assert!(changes.created);
        assert_eq!(changes.added, vec!["Column_A", "Amount"]);
        assert_eq!(
            store.table_columns("my_table").unwrap(),
            vec!["date", "datetime", "Column_A", "Amount"]
        );
    }

    #[test]
    fn second_run_is_a_no_op() {
        let store = Store::open_in_memory().unwrap();
        ensure_schema(&store, "my_table", &columns()).unwrap();
        let before = store.table_columns("my_table").unwrap();

        let changes = ensure_schema(&store, "my_table", &columns()).unwrap();
        assert!(changes.is_empty());
        assert_eq!(store.table_columns("my_table").unwrap(), before);
    }

    #[test]
    fn evolution_is_additive() {
        let store = Store::open_in_memory().unwrap();
        ensure_schema(&store, "my_table", &columns()).unwrap();
        store
            .connection()
            .execute_batch(r#"INSERT INTO my_table ("date", "datetime", "Column_A", "Amount") VALUES ('2024-03-15', 't', 'x', 1.5)"#)
            .unwrap();

        let changes =
            ensure_schema(&store, "my_table", &[ColumnSpec::new("Comment", ColumnType::Varchar)]).unwrap();
        assert_eq!(changes.added, vec!["Comment"]);
        assert_eq!(
            store.table_columns("my_table").unwrap(),
            vec!["date", "datetime", "Column_A", "Amount", "Comment"]
        );

        let comment: String = store
            .connection()
            .query_row(r#"SELECT "Comment" FROM my_table"#, [], |row| row.get(0))
            .unwrap();
        assert_eq!(comment, "");
    }

    #[test]
    fn existing_column_matches_case_insensitively() {
        let store = Store::open_in_memory().unwrap();
        ensure_schema(&store, "my_table", &columns()).unwrap();
        let changes =
            ensure_schema(&store, "MY_TABLE", &[ColumnSpec::new("amount", ColumnType::Double)]).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn store_failure_is_reported_for_the_table() {
        let store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch("CREATE VIEW my_table AS SELECT 1 AS x")
            .unwrap();

        let error = ensure_schema(&store, "my_table", &columns()).unwrap_err();
        assert!(matches!(error, SchemaError::Rejected { ref table, .. } if table == "my_table"));
        assert_eq!(store.table_columns("my_table").unwrap(), vec!["x"]);
    }

    #[test]
    fn empty_identifiers_are_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            ensure_schema(&store, "", &columns()),
            Err(SchemaError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            ensure_schema(&store, "t\"; DROP TABLE x", &columns()),
            Err(SchemaError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            ensure_schema(&store, "t", &[ColumnSpec::new("(*)", ColumnType::Varchar)]),
            Err(SchemaError::InvalidIdentifier(_))
        ));
    }
}
