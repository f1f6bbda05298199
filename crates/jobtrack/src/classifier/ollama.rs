//! Ollama backend

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use super::{
    ClassifierResponse, Classifier, ClassifyError, SYSTEM_PROMPT, response_schema, user_prompt,
};
use crate::error::ProviderError;
use crate::models::Classification;

/// Classifies emails with a local Ollama model in JSON mode
pub struct OllamaClassifier {
    agent: ureq::Agent,
    base_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClassifier {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:11434";
    pub const DEFAULT_MODEL: &'static str = "llama3.2";

    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn request_body(&self, subject: &str, body: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "system": SYSTEM_PROMPT,
            "prompt": user_prompt(subject, body),
            "format": response_schema(),
            "stream": false
        })
    }
}

impl Classifier for OllamaClassifier {
    fn classify(&self, subject: &str, body: &str) -> Result<Classification, ClassifyError> {
        let url = format!("{}/api/generate", self.base_url);

        let mut response = self
            .agent
            .post(&url)
            .send_json(self.request_body(subject, body))
            .map_err(ProviderError::from)?;

        let generated: GenerateResponse = response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        debug!("Ollama classification for {:?}: {}", subject, generated.response);

        ClassifierResponse::from_json(&generated.response)?.into_classification()
    }
}
