//! A single-sheet Office Open XML workbook, written as a zip package by hand.
//! Text cells are inline strings so no shared-string table is needed.

use std::fmt::Write as _;
use std::io::{Cursor, Write as _};

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::export::{COLUMNS, ExportError, submitted_at_cell};
use crate::model::RsvpRecord;

const SHEET_NAME: &str = "RSVPs";
const COLUMN_LETTERS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];
const COLUMN_WIDTHS: [u32; 5] = [6, 30, 36, 8, 18];

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#;

enum Cell {
    Text(String),
    Number(u64),
}

pub(crate) fn render(records: &[RsvpRecord]) -> Result<Vec<u8>, ExportError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("xl/workbook.xml", workbook()),
        ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
        ("xl/worksheets/sheet1.xml", worksheet(records)),
    ];
    for (name, body) in parts {
        writer.start_file(name, options)?;
        writer.write_all(body.as_bytes())?;
    }

    Ok(writer.finish()?.into_inner())
}

fn workbook() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{SHEET_NAME}" sheetId="1" r:id="rId1"/></sheets></workbook>"#
    )
}

fn worksheet(records: &[RsvpRecord]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cols>"#,
    );
    for (index, width) in COLUMN_WIDTHS.iter().enumerate() {
        let column = index + 1;
        let _ = write!(
            xml,
            r#"<col min="{column}" max="{column}" width="{width}" customWidth="1"/>"#
        );
    }
    xml.push_str("</cols><sheetData>");

    let header = COLUMNS.map(|title| Cell::Text(title.to_string()));
    write_row(&mut xml, 1, &header);
    for (index, record) in records.iter().enumerate() {
        let row = [
            Cell::Number(index as u64 + 1),
            Cell::Text(record.name.clone()),
            Cell::Text(record.affiliation.clone()),
            Cell::Number(u64::from(record.guests)),
            Cell::Text(submitted_at_cell(record)),
        ];
        write_row(&mut xml, index + 2, &row);
    }

    xml.push_str("</sheetData></worksheet>");
    xml
}

fn write_row(xml: &mut String, row: usize, cells: &[Cell]) {
    let _ = write!(xml, r#"<row r="{row}">"#);
    for (cell, column) in cells.iter().zip(COLUMN_LETTERS) {
        match cell {
            Cell::Text(text) => {
                let _ = write!(
                    xml,
                    r#"<c r="{column}{row}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    escape(text)
                );
            }
            Cell::Number(value) => {
                let _ = write!(xml, r#"<c r="{column}{row}"><v>{value}</v></c>"#);
            }
        }
    }
    xml.push_str("</row>");
}

/// XML 1.0 forbids most control characters even when escaped.
fn escape(text: &str) -> String {
    let printable: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();
    html_escape::encode_text(&printable).into_owned()
}
