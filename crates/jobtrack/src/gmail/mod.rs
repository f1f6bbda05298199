//! Gmail API integration
//!
//! This module provides:
//! - A Gmail REST client implementing [`crate::source::MessageSource`]
//! - The response types it decodes

mod client;

pub use client::{GmailClient, after_query, decode_raw_payload};

/// Gmail API response types
pub mod api {
    use serde::Deserialize;

    /// Response from listing messages
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ListMessagesResponse {
        pub messages: Option<Vec<MessageRef>>,
        pub next_page_token: Option<String>,
        pub result_size_estimate: Option<u32>,
    }

    /// Reference to a message (just ID and thread ID)
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessageRef {
        pub id: String,
        pub thread_id: Option<String>,
    }

    /// Message fetched with `format=raw`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct RawMessageResponse {
        pub id: String,
        /// Base64url-encoded RFC 822 message
        pub raw: Option<String>,
        pub internal_date: Option<String>,
    }
}
