//! Renders the full RSVP mirror as a downloadable file. Rendering is synchronous and never touches the store.

use std::str::FromStr;

use crate::model::RsvpRecord;

mod pdf;
mod xlsx;

pub const EXPORT_BASE_NAME: &str = "rsvp_list";

pub(crate) const COLUMNS: [&str; 5] = ["No.", "Name", "Affiliation", "Guests", "Submitted At"];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("could not write spreadsheet archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("could not write export: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{EXPORT_BASE_NAME}.{}", self.extension())
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn render(&self, records: &[RsvpRecord]) -> Result<Vec<u8>, ExportError> {
        let bytes = match self {
            ExportFormat::Pdf => pdf::render(records),
            ExportFormat::Xlsx => xlsx::render(records)?,
        };
        log::info!(
            "Exported {} RSVPs as {} ({} bytes)",
            records.len(),
            self.file_name(),
            bytes.len()
        );
        Ok(bytes)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format `{other}`")),
        }
    }
}

pub(crate) fn submitted_at_cell(record: &RsvpRecord) -> String {
    record
        .submitted_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
