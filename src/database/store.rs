use duckdb::{params, Connection};
use std::path::Path;
use tracing::debug;

/// An owned DuckDB connection, opened once per run.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: &Path) -> duckdb::Result<Self> {
        debug!(path = %path.display(), "opening table store");
        Ok(Self {
            conn: Connection::open(path)?,
        })
    }

    pub fn open_in_memory() -> duckdb::Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    /// Case-insensitive lookup of a table in the main schema.
    pub fn table_exists(&self, table: &str) -> duckdb::Result<bool> {
        let found: i64 = self.conn.query_row(
            "SELECT count(*) FROM information_schema.tables
              WHERE table_schema = 'main' AND lower(table_name) = lower(?)",
            params![table],
            |row| row.get(0),
        )?;
        Ok(found > 0)
    }

    /// Column names of `table` in ordinal order; empty when the table does not exist.
    pub fn table_columns(&self, table: &str) -> duckdb::Result<Vec<String>> {
        let mut statement = self.conn.prepare(
            "SELECT column_name FROM information_schema.columns
              WHERE table_schema = 'main' AND lower(table_name) = lower(?)
              ORDER BY ordinal_position",
        )?;
        let columns = statement
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn row_count(&self, table: &str) -> duckdb::Result<i64> {
        self.conn.query_row(
            &format!("SELECT count(*) FROM {}", super::column::quote(table)),
            [],
            |row| row.get(0),
        )
    }

    /// Releases the connection, reporting any error raised while closing.
    pub fn close(self) -> duckdb::Result<()> {
        self.conn.close().map_err(|(_, error)| error)
    }
}
