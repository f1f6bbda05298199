//! Job application records and their spreadsheet projection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ApplicationStatus;

/// Dedup key of a job application: at most one record per key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationKey {
    pub owner: String,
    pub job_title: String,
    pub company: String,
}

impl ApplicationKey {
    pub fn new(
        owner: impl Into<String>,
        job_title: impl Into<String>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            job_title: job_title.into(),
            company: company.into(),
        }
    }
}

/// A tracked job application
///
/// `row_number` is assigned once on creation from the owner's monotonic
/// sequence and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobApplication {
    pub owner: String,
    pub job_title: String,
    pub company: String,
    pub status: ApplicationStatus,
    /// `From` header of the latest email that matched this application
    pub sender_email: String,
    /// 1-based spreadsheet row
    pub row_number: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobApplication {
    pub fn key(&self) -> ApplicationKey {
        ApplicationKey::new(&self.owner, &self.job_title, &self.company)
    }

    /// Projection written to the spreadsheet
    pub fn sheet_row(&self) -> SheetRow {
        SheetRow {
            job_title: self.job_title.clone(),
            company: self.company.clone(),
            status: self.status,
            row_number: self.row_number,
        }
    }
}

/// Everything an upsert needs besides the owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationUpdate {
    pub job_title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub sender_email: String,
}

/// One spreadsheet row: columns A..C at `row_number`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub job_title: String,
    pub company: String,
    pub status: ApplicationStatus,
    pub row_number: u32,
}

impl SheetRow {
    /// Cell values in column order
    pub fn values(&self) -> [String; 3] {
        [
            self.job_title.clone(),
            self.company.clone(),
            self.status.as_str().to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_row_projection() {
        let now = Utc::now();
        let app = JobApplication {
            owner: "user@example.com".to_string(),
            job_title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            status: ApplicationStatus::NotInterested,
            sender_email: "jobs@acme.com".to_string(),
            row_number: 4,
            created_at: now,
            updated_at: now,
        };

        let row = app.sheet_row();
        assert_eq!(row.row_number, 4);
        assert_eq!(row.values(), [
            "Backend Engineer".to_string(),
            "Acme".to_string(),
            "not interested".to_string(),
        ]);
        assert_eq!(app.key(), ApplicationKey::new("user@example.com", "Backend Engineer", "Acme"));
    }
}
