//! Classifier output

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where an application stands, as read from the latest email about it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "applied")]
    Applied,
    #[serde(rename = "interview")]
    Interview,
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "not interested", alias = "not_interested")]
    NotInterested,
}

impl ApplicationStatus {
    /// Every status, in wire order
    pub const ALL: [ApplicationStatus; 5] = [
        Self::Applied,
        Self::Interview,
        Self::Offer,
        Self::Rejected,
        Self::NotInterested,
    ];

    /// Wire and sheet representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
            Self::NotInterested => "not interested",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown application status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "applied" => Ok(Self::Applied),
            "interview" => Ok(Self::Interview),
            "offer" => Ok(Self::Offer),
            "rejected" => Ok(Self::Rejected),
            "not interested" | "not_interested" => Ok(Self::NotInterested),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Result of classifying one email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_job_application: bool,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub status: ApplicationStatus,
}

impl Classification {
    /// A message that has nothing to do with a job application
    pub fn not_job_related() -> Self {
        Self {
            is_job_application: false,
            job_title: None,
            company_name: None,
            status: ApplicationStatus::Applied,
        }
    }

    /// A job application email with all fields present
    pub fn job(
        job_title: impl Into<String>,
        company_name: impl Into<String>,
        status: ApplicationStatus,
    ) -> Self {
        Self {
            is_job_application: true,
            job_title: Some(job_title.into()),
            company_name: Some(company_name.into()),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&ApplicationStatus::NotInterested).unwrap();
        assert_eq!(json, "\"not interested\"");

        let parsed: ApplicationStatus = serde_json::from_str("\"not_interested\"").unwrap();
        assert_eq!(parsed, ApplicationStatus::NotInterested);
    }

    #[test]
    fn test_status_from_str() {
        for status in ApplicationStatus::ALL {
            assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), status);
        }
        assert_eq!(
            " Interview ".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::Interview
        );
        assert!("ghosted".parse::<ApplicationStatus>().is_err());
    }
}
