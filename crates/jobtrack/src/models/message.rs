//! Mail provider messages, raw and parsed

use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message as delivered by the provider: its id plus the RFC 822 bytes.
///
/// Ephemeral. Fetched, parsed and dropped within one pipeline step.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: MessageId,
    pub data: Vec<u8>,
}

impl RawMessage {
    pub fn new(id: impl Into<MessageId>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// Sender, subject and normalized single-line body of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEmail {
    /// Raw `From` header value (display name included)
    pub sender: String,
    pub subject: String,
    /// Plain text with every CR/LF removed and outer whitespace trimmed
    pub body: String,
}
