//! A small PDF 1.4 writer: A4 pages, the two standard Helvetica faces, one text table.
//! Only the standard 14 fonts are used, so text is limited to WinAnsiEncoding; anything outside it becomes `?`.

use std::fmt::Write as _;

use crate::export::{COLUMNS, submitted_at_cell};
use crate::model::RsvpRecord;
use crate::query::total_guests;

const PAGE_WIDTH: i32 = 595;
const PAGE_HEIGHT: i32 = 842;
const LEFT: i32 = 40;
const TITLE_Y: i32 = 802;
const HEADER_Y: i32 = 774;
const FIRST_ROW_Y: i32 = 758;
const FOOTER_Y: i32 = 24;
const LINE_HEIGHT: i32 = 16;

pub(crate) const ROWS_PER_PAGE: usize = 44;

const COLUMN_X: [i32; 5] = [40, 75, 235, 430, 480];
const COLUMN_CHARS: [usize; 5] = [6, 30, 36, 8, 16];

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

#[derive(Default)]
struct PageContent(String);

impl PageContent {
    fn text(&mut self, font: &str, size: u32, x: i32, y: i32, text: &str) {
        let _ = writeln!(
            self.0,
            "BT /{font} {size} Tf {x} {y} Td ({}) Tj ET",
            escape(text)
        );
    }
}

pub(crate) fn render(records: &[RsvpRecord]) -> Vec<u8> {
    let chunks: Vec<&[RsvpRecord]> = if records.is_empty() {
        vec![&[]]
    } else {
        records.chunks(ROWS_PER_PAGE).collect()
    };
    let page_count = chunks.len();

    let mut pages = Vec::with_capacity(page_count);
    for (index, chunk) in chunks.into_iter().enumerate() {
        let mut page = PageContent::default();
        if index == 0 {
            page.text(BOLD, 14, LEFT, TITLE_Y, "RSVP List");
        }
        for (column, header) in COLUMNS.iter().enumerate() {
            page.text(BOLD, 10, COLUMN_X[column], HEADER_Y, header);
        }

        let mut y = FIRST_ROW_Y;
        for (offset, record) in chunk.iter().enumerate() {
            let cells = [
                (index * ROWS_PER_PAGE + offset + 1).to_string(),
                record.name.clone(),
                record.affiliation.clone(),
                record.guests.to_string(),
                submitted_at_cell(record),
            ];
            for (column, cell) in cells.iter().enumerate() {
                page.text(
                    REGULAR,
                    10,
                    COLUMN_X[column],
                    y,
                    &fit(cell, COLUMN_CHARS[column]),
                );
            }
            y -= LINE_HEIGHT;
        }

        if records.is_empty() {
            page.text(REGULAR, 10, LEFT, y, "No RSVPs submitted yet.");
            y -= LINE_HEIGHT;
        }
        if index + 1 == page_count {
            page.text(
                BOLD,
                10,
                LEFT,
                y - 4,
                &format!(
                    "Total RSVPs: {}    Total guests: {}",
                    records.len(),
                    total_guests(records)
                ),
            );
        }
        page.text(
            REGULAR,
            8,
            LEFT,
            FOOTER_Y,
            &format!("Page {} of {page_count}", index + 1),
        );
        pages.push(page.0);
    }

    assemble(&pages)
}

fn assemble(pages: &[String]) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3 and 4 fonts, then a (page, contents) pair per page
    let page_object = |index: usize| 5 + 2 * index;
    let kids: Vec<String> = (0..pages.len())
        .map(|index| format!("{} 0 R", page_object(index)))
        .collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];
    for (index, content) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /{REGULAR} 3 0 R /{BOLD} 4 0 R >> >> /Contents {} 0 R >>",
            page_object(index) + 1
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        let _ = write!(out, "{} 0 obj\n{body}\nendobj\n", index + 1);
    }

    let xref = out.len();
    let _ = write!(out, "xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(out, "{offset:010} 00000 n ");
    }
    let _ = write!(
        out,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
        objects.len() + 1
    );
    out.into_bytes()
}

fn fit(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// WinAnsiEncoding byte for `c`, if the standard fonts can show it.
fn win_ansi(c: char) -> Option<u8> {
    match c {
        ' '..='~' => Some(c as u8),
        '\u{A0}'..='\u{FF}' => Some(c as u8),
        '€' => Some(0x80),
        '‚' => Some(0x82),
        '„' => Some(0x84),
        '…' => Some(0x85),
        '‘' => Some(0x91),
        '’' => Some(0x92),
        '“' => Some(0x93),
        '”' => Some(0x94),
        '•' => Some(0x95),
        '–' => Some(0x96),
        '—' => Some(0x97),
        'Š' => Some(0x8A),
        'Œ' => Some(0x8C),
        'Ž' => Some(0x8E),
        'š' => Some(0x9A),
        'œ' => Some(0x9C),
        'ž' => Some(0x9E),
        'Ÿ' => Some(0x9F),
        _ => None,
    }
}

/// Literal string body. Bytes above ASCII are written as octal escapes so the content stream stays ASCII.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match win_ansi(c) {
            Some(b'(' | b')' | b'\\') => {
                escaped.push('\\');
                escaped.push(c);
            }
            Some(byte) if byte.is_ascii() => escaped.push(char::from(byte)),
            Some(byte) => {
                let _ = write!(escaped, "\\{byte:03o}");
            }
            None => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(i: usize, name: &str, guests: u32) -> RsvpRecord {
        RsvpRecord {
            id: format!("id{i}"),
            name: name.to_string(),
            affiliation: "SMAN Modal Bangsa".to_string(),
            guests,
            submitted_at: None,
        }
    }

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_document_structure() {
        let pdf = as_text(&render(&[record(0, "Budi", 2), record(1, "Siti", 3)]));
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert!(pdf.contains("(Budi) Tj"));
        assert!(pdf.contains("(SMAN Modal Bangsa) Tj"));
        assert!(pdf.contains("Total guests: 5"));
        assert!(pdf.contains("/Count 1"));
    }

    #[test]
    fn test_startxref_points_at_xref_table() {
        let pdf = as_text(&render(&[record(0, "Budi", 2)]));
        let tail = pdf.rsplit("startxref\n").next().unwrap();
        let offset: usize = tail.lines().next().unwrap().parse().unwrap();
        assert!(pdf[offset..].starts_with("xref\n"));

        let first_object = pdf.find("1 0 obj").unwrap();
        assert!(pdf.contains(&format!("{first_object:010} 00000 n ")));
    }

    #[test]
    fn test_long_lists_span_pages() {
        let records: Vec<RsvpRecord> = (0..60).map(|i| record(i, &format!("G{i}"), 1)).collect();
        let pdf = as_text(&render(&records));
        assert!(pdf.contains("/Count 2"));
        assert!(pdf.contains("(Page 2 of 2) Tj"));
        // numbering continues across pages
        assert!(pdf.contains(&format!("({}) Tj", ROWS_PER_PAGE + 1)));
    }

    #[test]
    fn test_empty_list() {
        let pdf = as_text(&render(&[]));
        assert!(pdf.contains("(No RSVPs submitted yet.) Tj"));
        assert!(pdf.contains("/Count 1"));
    }

    #[test]
    fn test_latin_names_keep_their_accents() {
        let pdf = as_text(&render(&[record(0, "José Muñoz", 1)]));
        assert!(pdf.contains("(Jos\\351 Mu\\361oz) Tj"));
        assert!(pdf.is_ascii());
    }

    #[test]
    fn test_text_is_escaped_and_fitted() {
        assert_eq!(escape("a (b) \\c"), "a \\(b\\) \\\\c");
        assert_eq!(escape("Zoë"), "Zo\\353");
        assert_eq!(escape("Agus Ñoño"), "Agus \\321o\\361o");
        assert_eq!(escape("O’Brien"), "O\\222Brien");
        assert_eq!(escape("李"), "?");
        assert_eq!(fit("abcdefghij", 6), "abc...");
        assert_eq!(fit("abc", 6), "abc");
    }
}
