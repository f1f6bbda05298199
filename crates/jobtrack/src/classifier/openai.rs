//! OpenAI chat-completions backend

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use super::{
    ClassifierResponse, Classifier, ClassifyError, SYSTEM_PROMPT, response_schema, user_prompt,
};
use crate::error::ProviderError;
use crate::models::Classification;

/// Classifies emails with an OpenAI chat model constrained to a JSON schema
pub struct OpenAiClassifier {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClassifier {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";

    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            api_key: api_key.into(),
            model: model.into(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Request body for one email
    fn request_body(&self, subject: &str, body: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "developer", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(subject, body) }
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "email_schema",
                    "strict": true,
                    "schema": response_schema()
                }
            }
        })
    }
}

impl Classifier for OpenAiClassifier {
    fn classify(&self, subject: &str, body: &str) -> Result<Classification, ClassifyError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(self.request_body(subject, body))
            .map_err(ProviderError::from)?;

        let completion: ChatCompletion = response
            .body_mut()
            .read_json()
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifyError::MalformedResponse("no choices in completion".into()))?;

        debug!("OpenAI classification for {:?}: {}", subject, content);

        ClassifierResponse::from_json(&content)?.into_classification()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let classifier = OpenAiClassifier::new("sk-test", "gpt-4o-mini", Duration::from_secs(5));
        let body = classifier.request_body("Your application", "Thanks for applying at Acme");

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "developer");
        assert_eq!(
            body["messages"][1]["content"],
            "Subject: Your application\nBody: Thanks for applying at Acme"
        );
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
    }

    #[test]
    fn test_completion_deserializes() {
        let json = r#"{"choices": [{"message": {"role": "assistant",
            "content": "{\"is_job_application_email\": false, \"job_title\": \"\", \"company_name\": \"\", \"status\": \"applied\"}"}}]}"#;
        let completion: ChatCompletion = serde_json::from_str(json).unwrap();
        let content = completion.choices[0].message.content.clone().unwrap();
        let classification = ClassifierResponse::from_json(&content)
            .unwrap()
            .into_classification()
            .unwrap();
        assert!(!classification.is_job_application);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let classifier = OpenAiClassifier::new("k", "m", Duration::from_secs(1))
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(classifier.base_url, "http://localhost:8080/v1");
    }
}
