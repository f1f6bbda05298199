//! Ingestion configuration
//!
//! Loaded from (in order of priority):
//! 1. An explicit JSON file path
//! 2. `jobtrack.json` in the config directory (~/.config/jobtrack/)
//! 3. Built-in defaults
//!
//! Environment variables then override individual fields.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{OllamaClassifier, OpenAiClassifier};

/// Config filename in the config directory
pub const CONFIG_FILE: &str = "jobtrack.json";

/// Default database filename in the config directory
pub const DATABASE_FILE: &str = "jobtrack.sqlite";

/// Env var overriding [`IngestConfig::page_size`]
pub const PAGE_SIZE_ENV: &str = "FETCH_BATCH_SIZE";

/// Env var holding the OpenAI API key when the config file has none
pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Which classifier backend to build, chosen once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClassifierConfig {
    #[serde(rename = "openai")]
    OpenAi {
        /// Falls back to `OPENAI_API_KEY` when absent
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_openai_model")]
        model: String,
        #[serde(default = "default_openai_base_url")]
        base_url: String,
    },
    #[serde(rename = "ollama")]
    Ollama {
        #[serde(default = "default_ollama_base_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        model: String,
    },
    #[default]
    #[serde(rename = "keyword")]
    Keyword,
}

fn default_openai_model() -> String {
    OpenAiClassifier::DEFAULT_MODEL.to_string()
}

fn default_openai_base_url() -> String {
    OpenAiClassifier::DEFAULT_BASE_URL.to_string()
}

fn default_ollama_base_url() -> String {
    OllamaClassifier::DEFAULT_BASE_URL.to_string()
}

fn default_ollama_model() -> String {
    OllamaClassifier::DEFAULT_MODEL.to_string()
}

impl ClassifierConfig {
    /// Read the OpenAI key from the environment
    pub fn openai_key_from_env() -> Result<String> {
        std::env::var(OPENAI_KEY_ENV)
            .with_context(|| format!("{} environment variable not set", OPENAI_KEY_ENV))
    }
}

/// Settings for the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Watermark used for an owner's first run
    pub start_from: NaiveDate,
    /// Message ids requested per listing page
    pub page_size: usize,
    /// Minimum pause between two spreadsheet row writes
    pub sheet_write_delay_ms: u64,
    /// Timeout applied to every HTTP request
    pub http_timeout_secs: u64,
    /// SQLite file; defaults to the config directory
    pub database_path: Option<PathBuf>,
    pub classifier: ClassifierConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            start_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            page_size: 10,
            sheet_write_delay_ms: 1_000,
            http_timeout_secs: 30,
            database_path: None,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl IngestConfig {
    /// Load from the config directory (or defaults) and apply env overrides
    pub fn load() -> Result<Self> {
        let base = if config::config_exists(CONFIG_FILE) {
            config::load_json(CONFIG_FILE)?
        } else {
            Self::default()
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Load from a specific JSON file and apply env overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let base: Self = config::load_json_file(path)?;
        base.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse from a JSON string (no env overrides)
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse ingest config JSON")
    }

    /// Apply overrides from a variable lookup
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(PAGE_SIZE_ENV) {
            self.page_size = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer, got {:?}", PAGE_SIZE_ENV, value))?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.page_size > 0, "page_size must be at least 1");
        anyhow::ensure!(self.http_timeout_secs > 0, "http_timeout_secs must be at least 1");
        Ok(())
    }

    /// First-run watermark as a UTC instant (midnight of `start_from`)
    pub fn start_from_utc(&self) -> DateTime<Utc> {
        self.start_from.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    pub fn sheet_write_delay(&self) -> Duration {
        Duration::from_millis(self.sheet_write_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Database path, defaulting to ~/.config/jobtrack/jobtrack.sqlite
    pub fn resolved_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => {
                let dir = config::ensure_config_dir()?;
                Ok(dir.join(DATABASE_FILE))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = IngestConfig::from_json("{}").unwrap();
        assert_eq!(config, IngestConfig::default());
        assert_eq!(config.page_size, 10);
        assert_eq!(config.sheet_write_delay(), Duration::from_secs(1));
        assert_eq!(config.classifier, ClassifierConfig::Keyword);
    }

    #[test]
    fn test_parse_openai_classifier() {
        let config = IngestConfig::from_json(
            r#"{
                "start_from": "2024-06-01",
                "page_size": 50,
                "classifier": { "kind": "openai", "api_key": "sk-test" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.start_from, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(config.page_size, 50);
        assert_eq!(
            config.classifier,
            ClassifierConfig::OpenAi {
                api_key: Some("sk-test".to_string()),
                model: "gpt-4o-mini".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_ollama_classifier_defaults() {
        let config = IngestConfig::from_json(r#"{ "classifier": { "kind": "ollama" } }"#).unwrap();
        assert_eq!(
            config.classifier,
            ClassifierConfig::Ollama {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_classifier_kind_rejected() {
        assert!(IngestConfig::from_json(r#"{ "classifier": { "kind": "dummy" } }"#).is_err());
    }

    #[test]
    fn test_page_size_override() {
        let config = IngestConfig::default()
            .with_overrides(|key| (key == PAGE_SIZE_ENV).then(|| "25".to_string()))
            .unwrap();
        assert_eq!(config.page_size, 25);

        let err = IngestConfig::default()
            .with_overrides(|key| (key == PAGE_SIZE_ENV).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(PAGE_SIZE_ENV));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let config = IngestConfig {
            page_size: 0,
            ..IngestConfig::default()
        };
        assert!(config.with_overrides(|_| None).is_err());
    }

    #[test]
    fn test_start_from_utc_is_midnight() {
        let config = IngestConfig::default();
        assert_eq!(config.start_from_utc().to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_explicit_database_path() {
        let config = IngestConfig {
            database_path: Some(PathBuf::from("/tmp/jobs.sqlite")),
            ..IngestConfig::default()
        };
        assert_eq!(config.resolved_database_path().unwrap(), PathBuf::from("/tmp/jobs.sqlite"));
    }
}
