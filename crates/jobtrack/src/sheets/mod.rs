//! Spreadsheet mirror
//!
//! The spreadsheet is a projection of the application store. Each row is
//! written to its own fixed range, so repeating a write is harmless.

mod client;

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::models::SheetRow;

pub use client::GoogleSheetsClient;

/// A row the mirror could not write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRow {
    pub row_number: u32,
    pub reason: String,
}

/// Outcome of one [`SheetMirror::place`] call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub written: usize,
    pub failed: Vec<FailedRow>,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: MirrorReport) {
        self.written += other.written;
        self.failed.extend(other.failed);
    }
}

/// Positional writer for application rows
pub trait SheetMirror: Send + Sync {
    /// Write every row to columns A..C of its `row_number` in `sheet_name`.
    ///
    /// A failing row is reported and the remaining rows are still written.
    fn place(&self, sheet_name: &str, rows: &[SheetRow]) -> MirrorReport;
}

/// A1 range covering columns A..C of one row
///
/// The tab name is always quoted so titles with spaces, `!` or a cell-like
/// shape such as `A1` still parse. Embedded quotes are doubled.
pub fn range_for(sheet_name: &str, row_number: u32) -> String {
    format!(
        "'{}'!A{}:C{}",
        sheet_name.replace('\'', "''"),
        row_number,
        row_number
    )
}

static SHEET_URL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/d/([a-zA-Z0-9_-]+)").expect("valid regex"));

/// Extract the spreadsheet id from a `https://docs.google.com/spreadsheets/d/<id>/...` URL
pub fn spreadsheet_id_from_url(url: &str) -> Result<String> {
    SHEET_URL_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| anyhow!("Invalid Google Sheets URL: {}", url))
}

/// Google Sheets API response types
pub mod api {
    use serde::{Deserialize, Serialize};

    /// Body of `spreadsheets.values.update`
    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ValueRange {
        pub range: String,
        pub major_dimension: String,
        pub values: Vec<Vec<String>>,
    }

    /// Response from `spreadsheets.values.update`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateValuesResponse {
        pub updated_range: Option<String>,
        pub updated_cells: Option<u32>,
    }

    /// Spreadsheet metadata restricted to `sheets.properties.title`
    #[derive(Debug, Deserialize)]
    pub struct SpreadsheetMetadata {
        #[serde(default)]
        pub sheets: Vec<Sheet>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Sheet {
        pub properties: SheetProperties,
    }

    #[derive(Debug, Deserialize)]
    pub struct SheetProperties {
        pub title: String,
    }
}
