//! Minimal `.xlsx` writer for tests.

use crate::spreadsheet::reference::index_to_reference;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub(crate) enum FixtureCell<'a> {
    Blank,
    /// Stored in the shared string table
    Shared(&'a str),
    /// Stored as an inline string
    Inline(&'a str),
    Number(&'a str),
    /// Day serial in the 1900 system, styled as a date
    Date(u32),
    Bool(bool),
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="2"><xf numFmtId="0"/><xf numFmtId="14" applyNumberFormat="1"/></cellXfs>
</styleSheet>"#;

/// Writes a workbook with one worksheet per `(name, rows)` entry.
pub(crate) fn write_workbook(path: &Path, sheets: &[(&str, Vec<Vec<FixtureCell>>)]) -> ZipResult<()> {
    let mut shared = Vec::<String>::new();
    let mut worksheets = Vec::<String>::new();
    for (_, rows) in sheets {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
        );
        for (row, cells) in rows.iter().enumerate() {
            xml.push_str(&format!(r#"<row r="{}">"#, row + 1));
            for (col, cell) in cells.iter().enumerate() {
                let reference = index_to_reference(row, col);
                match cell {
                    FixtureCell::Blank => {}
                    FixtureCell::Shared(text) => {
                        xml.push_str(&format!(r#"<c r="{reference}" t="s"><v>{}</v></c>"#, shared.len()));
                        shared.push(escape(text));
                    }
                    FixtureCell::Inline(text) => xml.push_str(&format!(
                        r#"<c r="{reference}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(text)
                    )),
                    FixtureCell::Number(value) => {
                        xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#))
                    }
                    FixtureCell::Date(serial) => {
                        xml.push_str(&format!(r#"<c r="{reference}" s="1"><v>{serial}</v></c>"#))
                    }
                    FixtureCell::Bool(value) => xml.push_str(&format!(
                        r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                        if *value { 1 } else { 0 }
                    )),
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        worksheets.push(xml);
    }

    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut relationships = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (index, (name, _)) in sheets.iter().enumerate() {
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape(name),
            index + 1,
            index + 1
        ));
        relationships.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            index + 1,
            index + 1
        ));
    }
    workbook.push_str("</sheets></workbook>");
    relationships.push_str("</Relationships>");

    let mut shared_strings = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{0}" uniqueCount="{0}">"#,
        shared.len()
    );
    for text in &shared {
        shared_strings.push_str(&format!("<si><t>{text}</t></si>"));
    }
    shared_strings.push_str("</sst>");

    let mut zip = ZipWriter::new(File::create(path)?);
    let options = SimpleFileOptions::default();
    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(workbook.as_bytes())?;
    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(relationships.as_bytes())?;
    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(STYLES.as_bytes())?;
    zip.start_file("xl/sharedStrings.xml", options)?;
    zip.write_all(shared_strings.as_bytes())?;
    for (index, xml) in worksheets.iter().enumerate() {
        zip.start_file(format!("xl/worksheets/sheet{}.xml", index + 1), options)?;
        zip.write_all(xml.as_bytes())?;
    }
    zip.finish()?;
    Ok(())
}
