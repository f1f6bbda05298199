//! Email classification
//!
//! A [`Classifier`] decides whether an email concerns a job application and,
//! if so, extracts the job title, company and status. Backends:
//! - [`OpenAiClassifier`]: chat completions with a strict JSON schema
//! - [`OllamaClassifier`]: local model via `/api/generate`
//! - [`KeywordClassifier`]: offline phrase heuristics
//!
//! The backend is chosen once from [`ClassifierConfig`] by [`build_classifier`].

mod keyword;
mod ollama;
mod openai;

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierConfig;
use crate::error::ProviderError;
use crate::models::{ApplicationStatus, Classification};

pub use keyword::KeywordClassifier;
pub use ollama::OllamaClassifier;
pub use openai::OpenAiClassifier;

/// Instructions shared by the LLM backends
pub(crate) const SYSTEM_PROMPT: &str = "You are a job applicant checking emails for job applications. \
When you receive an email, first check whether it is about one of your job applications. \
If it is, extract the job title, the company name and the application status as JSON. \
The status is one of \"applied\", \"interview\", \"offer\", \"rejected\" or \"not interested\". \
If it is not a job application email, set is_job_application_email to false.";

/// Longest body excerpt sent to a remote model
pub(crate) const MAX_BODY_CHARS: usize = 8_000;

/// Errors from a classification attempt
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The backing service failed
    #[error("Classifier provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The service answered with something that is not the expected JSON
    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    /// Flagged as a job application but without a title or company
    #[error("Classifier marked a job application without {missing}")]
    IncompleteResult { missing: &'static str },
}

impl ClassifyError {
    /// Whether classifying the same message again may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_transient(),
            Self::MalformedResponse(_) | Self::IncompleteResult { .. } => false,
        }
    }
}

/// Capability: classify one email
///
/// Implementations may call remote services and must be treated as slow and
/// fallible. One call yields one result for one message.
pub trait Classifier: Send + Sync {
    fn classify(&self, subject: &str, body: &str) -> Result<Classification, ClassifyError>;
}

/// JSON object returned by the LLM backends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierResponse {
    pub is_job_application_email: bool,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

impl ClassifierResponse {
    /// Parse a model's JSON text answer
    pub fn from_json(content: &str) -> Result<Self, ClassifyError> {
        serde_json::from_str(content.trim())
            .map_err(|e| ClassifyError::MalformedResponse(format!("{}: {:?}", e, content)))
    }

    /// Validate into a [`Classification`]
    pub fn into_classification(self) -> Result<Classification, ClassifyError> {
        if !self.is_job_application_email {
            return Ok(Classification::not_job_related());
        }

        let job_title = non_empty(self.job_title)
            .ok_or(ClassifyError::IncompleteResult { missing: "job title" })?;
        let company_name = non_empty(self.company_name)
            .ok_or(ClassifyError::IncompleteResult { missing: "company name" })?;

        Ok(Classification::job(
            job_title,
            company_name,
            self.status.unwrap_or(ApplicationStatus::Applied),
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// JSON schema the LLM backends are asked to follow
pub(crate) fn response_schema() -> serde_json::Value {
    let statuses: Vec<&str> = ApplicationStatus::ALL.iter().map(|s| s.as_str()).collect();
    serde_json::json!({
        "type": "object",
        "properties": {
            "is_job_application_email": { "type": "boolean" },
            "job_title": { "type": "string" },
            "company_name": { "type": "string" },
            "status": { "type": "string", "enum": statuses }
        },
        "required": ["is_job_application_email", "job_title", "company_name", "status"],
        "additionalProperties": false
    })
}

/// User message sent to the LLM backends
pub(crate) fn user_prompt(subject: &str, body: &str) -> String {
    let excerpt: String = body.chars().take(MAX_BODY_CHARS).collect();
    format!("Subject: {}\nBody: {}", subject, excerpt)
}

/// Build the configured classifier backend
pub fn build_classifier(config: &ClassifierConfig, timeout: Duration) -> Result<Box<dyn Classifier>> {
    Ok(match config {
        ClassifierConfig::OpenAi { api_key, model, base_url } => {
            let api_key = match api_key {
                Some(key) => key.clone(),
                None => ClassifierConfig::openai_key_from_env()?,
            };
            Box::new(OpenAiClassifier::new(api_key, model.clone(), timeout).with_base_url(base_url))
        }
        ClassifierConfig::Ollama { base_url, model } => {
            Box::new(OllamaClassifier::new(base_url.clone(), model.clone(), timeout))
        }
        ClassifierConfig::Keyword => Box::new(KeywordClassifier::new()),
    })
}
