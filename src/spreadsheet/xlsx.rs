use crate::error::{IngestError, ResultMessage};
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::helpers::xml::XmlTextContextHelper;
use crate::helpers::zip::ZipHelper;
use crate::match_xml_events;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::excel;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::reference::reference_to_index;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::SpreadsheetError;
use quick_xml::events::Event;
use quick_xml::name::QName;
use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use zip::ZipArchive;

const TAG_SHARED_STRING_ITEM: QName = QName(b"si"); // Shared string table item
const TAG_PHONETIC_TEXT: QName = QName(b"rPh"); // Phonetic run, not part of the value
const TAG_TEXT: QName = QName(b"t");
const TAG_ROW: QName = QName(b"row");
const TAG_CELL: QName = QName(b"c");
const TAG_INLINE_STRING: QName = QName(b"is");
const TAG_VALUE: QName = QName(b"v");

/// An opened `.xlsx` workbook
pub struct XlsxWorkbook {
    /// File name of the workbook
    pub name: String,
    zip: ZipArchive<BufReader<File>>,
    /// Cell type per style index
    number_formats: Vec<CellType>,
    /// Worksheets as (name, zip_path) pairs, in workbook order
    sheets: Vec<(String, String)>,
}

impl XlsxWorkbook {
    /// Opens an `.xlsx` file and parses its workbook structure and styles
    pub fn open(path: &Path) -> Result<XlsxWorkbook, IngestError> {
        let name = path.to_string_lossy().to_string();
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let (sheets, is_1904) = excel::load_workbook(&mut zip)?;
        if sheets.is_empty() {
            Err(SpreadsheetError::SpreadsheetEmptyError(name.to_owned()))?
        }
        let number_formats = excel::load_number_formats(&mut zip, is_1904)?;
        Ok(XlsxWorkbook {
            name,
            zip,
            number_formats,
            sheets,
        })
    }

    /// Loads the shared string table; a workbook without one has no shared strings
    fn load_shared_strings(&mut self) -> Result<Vec<String>, IngestError> {
        let mut shared_strings = Vec::<String>::new();
        let mut reader = match self.zip.xml_reader("xl/sharedStrings.xml")? {
            Some(reader) => reader,
            None => return Ok(shared_strings),
        };
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_SHARED_STRING_ITEM => {
                shared_strings.push(read_string_value(&mut reader, TAG_SHARED_STRING_ITEM, false)?);
            }
        });
        Ok(shared_strings)
    }

    /// Reads every non-empty cell of the named sheet, resolving shared strings to text
    pub fn read_sheet(&mut self, sheet_name: &str) -> Result<Sheet, IngestError> {
        let zip_path = self
            .sheets
            .iter()
            .find(|(name, _)| name == sheet_name)
            .map(|(_, zip_path)| zip_path.to_owned())
            .ok_or_else(|| SpreadsheetError::SheetNotFound(self.name.to_owned(), sheet_name.to_owned()))?;
        let shared_strings = self.load_shared_strings().with_prefix("Failed to read shared strings")?;

        let mut sheet = Sheet::new(&self.name, sheet_name);
        let mut row_count = 0usize;
        let mut col_count = 0usize;
        let mut row = 0usize;
        let mut col = 0usize;
        let mut kind = CellType::default();
        let mut value = String::new();
        let mut reader = self
            .zip
            .xml_reader(&zip_path)?
            .ok_or_else(|| SpreadsheetError::FileError(zip_path.to_owned()))?;
        match_xml_events!(reader => {
            Event::Start(event) if event.name() == TAG_ROW => {
                if let Some(r) = event.get_attribute_value("r")? {
                    row_count = r.parse::<usize>()?.saturating_sub(1);
                }
                col_count = 0;
            }
            Event::End(event) if event.name() == TAG_ROW => row_count += 1,
            Event::Start(event) if event.name() == TAG_CELL => {
                (row, col) = event.get_attribute_value("r")?
                    .and_then(|reference| reference_to_index(&reference))
                    .unwrap_or((row_count, col_count));
                col_count = col + 1;
                value.clear();
                kind = match event.get_attribute_value("t")?.as_deref() {
                    Some("inlineStr") | Some("str") => CellType::Text,
                    Some("s") => CellType::SharedString,
                    Some("d") => CellType::IsoDateTime,
                    Some("b") => CellType::Boolean,
                    Some("e") => CellType::Error,
                    _ => CellType::Number,
                };
                if kind == CellType::Number {
                    if let Some(style) = event.get_attribute_value("s")?.filter(|s| !s.is_empty()) {
                        let index = style.parse::<usize>()?;
                        kind = self.number_formats.get(index).copied().unwrap_or(CellType::Number);
                    }
                }
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_INLINE_STRING => {
                value = read_string_value(&mut reader, TAG_INLINE_STRING, false)?;
            }
            Event::Start(event) if kind != CellType::Empty && event.name() == TAG_VALUE => {
                value = read_string_value(&mut reader, TAG_VALUE, true)?;
            }
            Event::End(event) if event.name() == TAG_CELL => {
                if kind != CellType::Empty && !value.is_empty() {
                    let cell = match kind {
                        CellType::SharedString => {
                            let index = value.parse::<usize>()?;
                            let text = shared_strings.get(index).ok_or_else(|| {
                                SpreadsheetError::CellValueError(
                                    sheet.file_name.to_owned(),
                                    sheet.name.to_owned(),
                                    index_to_reference(row, col),
                                    format!("shared string {index} does not exist"),
                                )
                            })?;
                            Cell { row, col, kind: CellType::Text, value: text.to_owned() }
                        }
                        _ => Cell { row, col, kind, value: value.to_owned() },
                    };
                    sheet.push(cell);
                }
                kind = CellType::Empty;
                value.clear();
            }
        });
        Ok(sheet)
    }
}

/// Reads the text of a string item up to `end_tag`, skipping phonetic runs.
/// `is_text_content` treats bare text as the value (`<v>`); otherwise only `<t>` runs count.
fn read_string_value<R: BufRead>(
    reader: &mut XmlReader<R>,
    end_tag: QName,
    is_text_content: bool,
) -> Result<String, IngestError> {
    let mut is_phonetic_text = false;
    let mut is_text = is_text_content;
    let mut text = String::new();
    match_xml_events!(reader => {
        Event::End(event) if event.name() == end_tag => break,
        Event::Start(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = true,
        Event::End(event) if event.name() == TAG_PHONETIC_TEXT => is_phonetic_text = false,
        Event::Start(event) if !is_phonetic_text && event.name() == TAG_TEXT => is_text = true,
        Event::End(event) if is_text && event.name() == TAG_TEXT => is_text = false,
        Event::Text(event) if is_text => text.push_str(&event.xml_content()?),
        Event::CData(event) if is_text => text.push_str(&event.xml_content()?),
        Event::GeneralRef(event) if is_text => text.push_bytes_ref(&event)?,
    });
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::fixtures::{write_workbook, FixtureCell};

    #[test]
    fn reads_inline_shared_and_numeric_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_workbook(
            &path,
            &[(
                "Data",
                vec![
                    vec![FixtureCell::Shared("Name"), FixtureCell::Inline("Amount"), FixtureCell::Inline("When")],
                    vec![FixtureCell::Shared("Alice & Bob"), FixtureCell::Number("12.5"), FixtureCell::Date(45366)],
                    vec![FixtureCell::Blank, FixtureCell::Bool(true), FixtureCell::Inline("x")],
                ],
            )],
        )
        .unwrap();

        let mut workbook = XlsxWorkbook::open(&path).unwrap();
        assert_eq!(workbook.name, path.to_string_lossy());

        let sheet = workbook.read_sheet("Data").unwrap();
        assert_eq!(sheet.row_upper_bound, Some(2));
        assert_eq!(sheet.get(0, 0).unwrap().to_text(), "Name");
        assert_eq!(sheet.get(1, 0).unwrap().to_text(), "Alice & Bob");
        assert_eq!(sheet.get(1, 1).unwrap().kind, CellType::Number);
        assert_eq!(sheet.get(1, 2).unwrap().to_text(), "2024-03-15");
        assert!(sheet.get(2, 0).is_none());
        assert_eq!(sheet.get(2, 1).unwrap().to_text(), "true");
    }

    #[test]
    fn unknown_sheet_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_workbook(&path, &[("Sheet1", vec![vec![FixtureCell::Inline("a")]])]).unwrap();

        let mut workbook = XlsxWorkbook::open(&path).unwrap();
        let error = workbook.read_sheet("Missing").unwrap_err();
        assert!(matches!(
            error,
            IngestError::SpreadsheetError(SpreadsheetError::SheetNotFound(_, ref sheet)) if sheet == "Missing"
        ));
    }

    #[test]
    fn not_a_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        std::fs::write(&path, b"plain text").unwrap();

        assert!(matches!(XlsxWorkbook::open(&path), Err(IngestError::ZipError(_))));
    }
}
