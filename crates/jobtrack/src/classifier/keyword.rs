//! Offline keyword classifier
//!
//! Recognizes the stock phrasing of application confirmations, interview
//! invitations, offers and rejections. Title and company come from simple
//! patterns over the subject and body. Used when no model is configured.

use std::sync::LazyLock;

use regex::Regex;

use super::{Classifier, ClassifyError};
use crate::models::{ApplicationStatus, Classification};

pub const UNKNOWN_POSITION: &str = "Unknown Position";
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Phrase lists checked in order; the first status with a hit wins
const STATUS_PHRASES: &[(ApplicationStatus, &[&str])] = &[
    (
        ApplicationStatus::Offer,
        &["pleased to offer", "job offer", "offer letter", "extend an offer", "offer of employment"],
    ),
    (
        ApplicationStatus::Rejected,
        &[
            "not to move forward",
            "not be moving forward",
            "move forward with other candidates",
            "regret to inform",
            "position has been filled",
            "decided to pursue other candidates",
        ],
    ),
    (
        ApplicationStatus::Interview,
        &[
            "invite you to interview",
            "invite you for an interview",
            "interview invitation",
            "schedule an interview",
            "schedule your interview",
            "next round of interviews",
            "phone screen",
            "availability for a call",
            "technical assessment",
        ],
    ),
    (
        ApplicationStatus::NotInterested,
        &["withdrawn your application", "withdraw your application", "no longer interested"],
    ),
    (
        ApplicationStatus::Applied,
        &[
            "thank you for applying",
            "thanks for applying",
            "application received",
            "received your application",
            "application has been submitted",
            "application was submitted",
            "thank you for your application",
            "thank you for your interest in",
        ],
    ),
];

/// A status phrase only counts next to one of these words
static APPLICATION_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:application|applying|applied|candidate|candidacy|position|role|hiring|recruiter|recruiting)\b")
        .expect("valid regex")
});

static APPLICATION_FOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bapplication (?:for|to) (?:the )?(.+?)(?: position| role)?(?: at | with |[.,!;:]|$)")
        .expect("valid regex")
});

static SUBJECT_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:Hiring|Opportunity): )?([A-Za-z ]+)").expect("valid regex")
});

static AT_COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat ([A-Z][A-Za-z0-9&]*(?: [A-Z][A-Za-z0-9&]*)*)").expect("valid regex")
});

/// Phrase-matching classifier with no external calls
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    fn detect_status(subject: &str, body: &str) -> Option<ApplicationStatus> {
        let content = format!("{} {}", subject, body).to_lowercase();
        if !APPLICATION_CONTEXT.is_match(&content) {
            return None;
        }
        STATUS_PHRASES
            .iter()
            .find(|(_, phrases)| phrases.iter().any(|p| content.contains(p)))
            .map(|(status, _)| *status)
    }
}

/// Job title from "application for X" phrasing, else the leading words of the subject
pub fn extract_job_title(subject: &str, body: &str) -> String {
    let from_phrase = [subject, body].into_iter().find_map(|text| {
        APPLICATION_FOR
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
    });

    from_phrase
        .or_else(|| {
            SUBJECT_TITLE
                .captures(subject)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| UNKNOWN_POSITION.to_string())
}

/// Company from "at Company Name" in the body, then the subject
pub fn extract_company(subject: &str, body: &str) -> String {
    [body, subject]
        .into_iter()
        .find_map(|text| {
            AT_COMPANY
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string())
}

impl Classifier for KeywordClassifier {
    fn classify(&self, subject: &str, body: &str) -> Result<Classification, ClassifyError> {
        let Some(status) = Self::detect_status(subject, body) else {
            return Ok(Classification::not_job_related());
        };

        Ok(Classification::job(
            extract_job_title(subject, body),
            extract_company(subject, body),
            status,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_confirmation() {
        let result = KeywordClassifier::new()
            .classify(
                "Your application for Backend Engineer at Acme Corp",
                "Thank you for applying to the Backend Engineer role at Acme Corp. We will be in touch.",
            )
            .unwrap();

        assert_eq!(
            result,
            Classification::job("Backend Engineer", "Acme Corp", ApplicationStatus::Applied)
        );
    }

    #[test]
    fn test_rejection_wins_over_interview_mention() {
        let result = KeywordClassifier::new()
            .classify(
                "Update on your application",
                "Thank you for taking the time to interview at Globex. Unfortunately we will not be moving forward.",
            )
            .unwrap();

        assert!(result.is_job_application);
        assert_eq!(result.status, ApplicationStatus::Rejected);
        assert_eq!(result.company_name.as_deref(), Some("Globex"));
    }

    #[test]
    fn test_offer() {
        let result = KeywordClassifier::new()
            .classify("Hiring: Data Analyst", "We are pleased to offer you the position at Initech.")
            .unwrap();

        assert_eq!(result.status, ApplicationStatus::Offer);
        assert_eq!(result.job_title.as_deref(), Some("Data Analyst"));
        assert_eq!(result.company_name.as_deref(), Some("Initech"));
    }

    #[test]
    fn test_unrelated_email() {
        let result = KeywordClassifier::new()
            .classify("Lunch on Friday?", "Are you around for tacos at noon")
            .unwrap();
        assert!(!result.is_job_application);
    }

    #[test]
    fn test_status_phrase_without_application_context() {
        let classifier = KeywordClassifier::new();
        let cases = [
            ("Lunch tomorrow?", "Unfortunately I can't make it"),
            (
                "New episode is out",
                "In this interview our host talks with a founder about the early days.",
            ),
            (
                "Weekly Deals",
                "Thank you for your interest in Weekly Deals. Here are this week's coupons.",
            ),
        ];

        for (subject, body) in cases {
            let result = classifier.classify(subject, body).unwrap();
            assert!(!result.is_job_application, "{subject:?} was treated as an application");
        }
    }

    #[test]
    fn test_interview_invitation() {
        let result = KeywordClassifier::new()
            .classify(
                "Next steps for the Platform Engineer role",
                "We would like to schedule an interview with you at Hooli next week.",
            )
            .unwrap();

        assert_eq!(result.status, ApplicationStatus::Interview);
        assert_eq!(result.company_name.as_deref(), Some("Hooli"));
    }

    #[test]
    fn test_extractor_fallbacks() {
        assert_eq!(extract_job_title("", ""), UNKNOWN_POSITION);
        assert_eq!(extract_company("no company here", "none either"), UNKNOWN_COMPANY);
        assert_eq!(extract_job_title("Opportunity: Product Designer", ""), "Product Designer");
    }
}
