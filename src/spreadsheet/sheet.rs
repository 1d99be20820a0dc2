use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::SpreadsheetError;
use std::collections::HashMap;

/// A sheet read from a workbook: the non-empty cells plus the bounds they span.
#[derive(Debug)]
pub struct Sheet {
    /// Source file name
    pub file_name: String,
    /// Sheet name
    pub name: String,
    /// All cells in the sheet, in document order
    pub cells: Vec<Cell>,
    /// (row, col) → position in `cells`
    indexes: HashMap<(usize, usize), usize>,
    /// Last row and column holding data
    pub row_upper_bound: Option<usize>,
    pub col_upper_bound: Option<usize>,
}

impl Sheet {
    pub(crate) fn new(file_name: &str, name: &str) -> Self {
        Self {
            file_name: file_name.to_owned(),
            name: name.to_owned(),
            cells: Vec::new(),
            indexes: HashMap::new(),
            row_upper_bound: None,
            col_upper_bound: None,
        }
    }

    /// Adds a cell, updating the data range. A later cell at the same position replaces the earlier one.
    pub(crate) fn push(&mut self, cell: Cell) {
        self.update_bound(cell.row, cell.col);
        if let Some(index) = self.indexes.get(&(cell.row, cell.col)) {
            self.cells[*index] = cell;
        } else {
            self.indexes.insert((cell.row, cell.col), self.cells.len());
            self.cells.push(cell);
        }
    }

    fn update_bound(&mut self, row: usize, col: usize) {
        if self.row_upper_bound.map(|upper| upper < row).unwrap_or(true) {
            self.row_upper_bound = Some(row);
        }
        if self.col_upper_bound.map(|upper| upper < col).unwrap_or(true) {
            self.col_upper_bound = Some(col);
        }
    }

    /// Gets the cell at the given 0-based position.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.indexes.get(&(row, col)).and_then(|index| self.cells.get(*index))
    }

    /// Width of a record: columns `0..=col_upper_bound`.
    pub fn width(&self) -> usize {
        self.col_upper_bound.map(|upper| upper + 1).unwrap_or(0)
    }

    /// Cells of one physical row, one slot per column from column A.
    pub fn record(&self, row: usize) -> Vec<Option<&Cell>> {
        (0..self.width()).map(|col| self.get(row, col)).collect()
    }

    /// Header labels of the given physical row; blank header cells yield `None`.
    ///
    /// Fails when the row lies past the last row holding data.
    pub fn header(&self, row: usize) -> Result<Vec<Option<String>>, SpreadsheetError> {
        match self.row_upper_bound {
            Some(upper) if row <= upper => Ok(self
                .record(row)
                .into_iter()
                .map(|cell| cell.filter(|cell| !cell.is_blank()).map(Cell::to_text))
                .collect()),
            _ => Err(SpreadsheetError::MissingHeaderRow(
                self.file_name.to_owned(),
                self.name.to_owned(),
                row.saturating_add(1),
            )),
        }
    }

    /// Physical rows after `header_row` that hold at least one non-blank cell,
    /// considering at most `limit` physical rows.
    pub fn data_rows(&self, header_row: usize, limit: Option<usize>) -> Vec<usize> {
        let upper = match self.row_upper_bound {
            Some(upper) if upper > header_row => upper,
            _ => return Vec::new(),
        };
        let upper = limit
            .map(|limit| upper.min(header_row.saturating_add(limit)))
            .unwrap_or(upper);
        let mut rows: Vec<usize> = self
            .cells
            .iter()
            .filter(|cell| cell.row > header_row && cell.row <= upper && !cell.is_blank())
            .map(|cell| cell.row)
            .collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }
}
