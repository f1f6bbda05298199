//! Google Sheets API HTTP client

use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::api::{SpreadsheetMetadata, UpdateValuesResponse, ValueRange};
use super::{FailedRow, MirrorReport, SheetMirror, range_for};
use crate::error::ProviderError;
use crate::models::SheetRow;

/// Sheets client bound to one spreadsheet
///
/// Row writes are spaced at least `write_delay` apart, across batches too.
pub struct GoogleSheetsClient {
    agent: ureq::Agent,
    access_token: String,
    spreadsheet_id: String,
    base_url: String,
    write_delay: Duration,
    last_write: Mutex<Option<Instant>>,
}

impl GoogleSheetsClient {
    /// Sheets API base URL
    const BASE_URL: &'static str = "https://sheets.googleapis.com/v4";

    /// Create a new Sheets client
    ///
    /// # Arguments
    /// * `access_token` - OAuth2 bearer token with spreadsheet write scope
    /// * `spreadsheet_id` - Target spreadsheet
    /// * `timeout` - Upper bound for each HTTP request
    /// * `write_delay` - Minimum pause between two row writes
    pub fn new(
        access_token: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        timeout: Duration,
        write_delay: Duration,
    ) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            access_token: access_token.into(),
            spreadsheet_id: spreadsheet_id.into(),
            base_url: Self::BASE_URL.to_string(),
            write_delay,
            last_write: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn spreadsheet_url(&self) -> String {
        format!(
            "{}/spreadsheets/{}",
            self.base_url,
            urlencoding::encode(&self.spreadsheet_id)
        )
    }

    /// Title of the spreadsheet's first tab
    pub fn first_sheet_name(&self) -> Result<String, ProviderError> {
        let mut response = self
            .agent
            .get(&self.spreadsheet_url())
            .header("Authorization", &format!("Bearer {}", self.access_token))
            .query("fields", "sheets.properties.title")
            .call()?;

        let metadata: SpreadsheetMetadata = response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        metadata
            .sheets
            .into_iter()
            .next()
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| ProviderError::Decode("spreadsheet has no sheets".to_string()))
    }

    /// Overwrite columns A..C of one row (`valueInputOption=RAW`)
    pub fn update_row(&self, sheet_name: &str, row: &SheetRow) -> Result<(), ProviderError> {
        let range = range_for(sheet_name, row.row_number);
        let url = format!(
            "{}/values/{}",
            self.spreadsheet_url(),
            urlencoding::encode(&range)
        );
        let body = ValueRange {
            range: range.clone(),
            major_dimension: "ROWS".to_string(),
            values: vec![row.values().to_vec()],
        };

        self.throttle();
        let result = self
            .agent
            .put(&url)
            .header("Authorization", &format!("Bearer {}", self.access_token))
            .query("valueInputOption", "RAW")
            .send_json(&body);
        self.mark_written();

        let mut response = result?;
        let updated: UpdateValuesResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!(
            "Wrote {} ({:?} cells)",
            updated.updated_range.as_deref().unwrap_or(&range),
            updated.updated_cells
        );
        Ok(())
    }

    /// Sleep until `write_delay` has passed since the previous write
    fn throttle(&self) {
        let last = *self.last_write.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.write_delay {
                std::thread::sleep(self.write_delay - elapsed);
            }
        }
    }

    fn mark_written(&self) {
        *self.last_write.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

impl SheetMirror for GoogleSheetsClient {
    fn place(&self, sheet_name: &str, rows: &[SheetRow]) -> MirrorReport {
        let mut report = MirrorReport::default();

        for row in rows {
            match self.update_row(sheet_name, row) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    warn!(
                        "Failed to write row {} of {}: {}",
                        row.row_number, self.spreadsheet_id, e
                    );
                    report.failed.push(FailedRow {
                        row_number: row.row_number,
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_client(write_delay: Duration) -> GoogleSheetsClient {
        GoogleSheetsClient::new("token", "sheet-id", Duration::from_secs(5), write_delay)
    }

    #[test]
    fn test_spreadsheet_url() {
        let client = make_test_client(Duration::ZERO).with_base_url("http://localhost:9000/v4/");
        assert_eq!(client.spreadsheet_url(), "http://localhost:9000/v4/spreadsheets/sheet-id");
    }

    #[test]
    fn test_value_range_body() {
        let body = ValueRange {
            range: range_for("Sheet1", 3),
            major_dimension: "ROWS".to_string(),
            values: vec![vec!["SRE".into(), "Acme".into(), "applied".into()]],
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["range"], "'Sheet1'!A3:C3");
        assert_eq!(json["majorDimension"], "ROWS");
        assert_eq!(json["values"][0][2], "applied");
    }

    #[test]
    fn test_throttle_waits_for_delay() {
        let client = make_test_client(Duration::from_millis(50));
        client.throttle();

        client.mark_written();
        let start = Instant::now();
        client.throttle();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_failed_rows_do_not_stop_batch() {
        // Nothing listens on port 9, so every write fails fast
        let client = make_test_client(Duration::ZERO).with_base_url("http://127.0.0.1:9");
        let rows: Vec<SheetRow> = (1..=3)
            .map(|n| SheetRow {
                job_title: format!("Role {}", n),
                company: "Acme".to_string(),
                status: crate::models::ApplicationStatus::Applied,
                row_number: n,
            })
            .collect();

        let report = client.place("Sheet1", &rows);
        assert_eq!(report.written, 0);
        let failed: Vec<u32> = report.failed.iter().map(|f| f.row_number).collect();
        assert_eq!(failed, vec![1, 2, 3]);
    }
}
