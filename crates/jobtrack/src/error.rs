//! Error types shared across the ingestion pipeline
//!
//! Collaborators report failures as [`ProviderError`], which knows whether a
//! later retry can succeed. The pipeline turns per-message failures into
//! [`SkippedMessage`] entries and reserves [`IngestError`] for failures that
//! end a run.

use std::fmt;

use crate::models::MessageId;

/// Failure talking to an external HTTP collaborator (Gmail, Sheets, LLM)
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP 429 from the provider
    #[error("Rate limited by provider")]
    RateLimited,

    /// The request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// Any other non-success HTTP status
    #[error("Provider returned HTTP {code}")]
    Status { code: u16 },

    /// Connection, TLS or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be decoded
    #[error("Failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether retrying the same call later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited | Self::Timeout | Self::Transport(_) => true,
            Self::Status { code } => *code >= 500,
            Self::Decode(_) => false,
        }
    }
}

impl From<ureq::Error> for ProviderError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(429) => Self::RateLimited,
            ureq::Error::StatusCode(code) => Self::Status { code },
            ureq::Error::Timeout(_) => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Failure that ends a pipeline run without writing a checkpoint
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Listing a page of message ids failed; retry later from the same watermark
    #[error("Failed to list messages: {0}")]
    Listing(#[source] ProviderError),

    /// The run was asked to stop before finishing
    #[error("Run cancelled before completion")]
    Cancelled,

    /// The application store rejected a write
    #[error("Application store failure: {0:#}")]
    Store(anyhow::Error),

    /// Reading or writing the checkpoint log failed
    #[error("Checkpoint log failure: {0:#}")]
    Checkpoint(anyhow::Error),
}

/// Pipeline step at which a single message was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Fetch,
    Parse,
    Classify,
}

impl fmt::Display for SkipStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::Classify => "classify",
        };
        f.write_str(name)
    }
}

/// A message the run skipped, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMessage {
    pub message_id: MessageId,
    pub stage: SkipStage,
    pub reason: String,
    /// Whether the same message may succeed on a later run
    pub transient: bool,
}
