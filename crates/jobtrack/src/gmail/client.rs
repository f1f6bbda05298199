//! Gmail API HTTP client
//!
//! Lists and fetches messages for the ingestion pipeline.
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::time::Duration;

use base64::prelude::*;
use chrono::NaiveDate;
use log::debug;
use serde::de::DeserializeOwned;

use super::api::{ListMessagesResponse, RawMessageResponse};
use crate::error::ProviderError;
use crate::models::{MessageId, RawMessage};
use crate::source::{MessagePage, MessageSource};

/// Gmail API client authenticated with a ready-made OAuth access token
pub struct GmailClient {
    agent: ureq::Agent,
    access_token: String,
    base_url: String,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Largest page Gmail will return
    const MAX_PAGE_SIZE: usize = 500;

    /// Create a new Gmail client
    ///
    /// # Arguments
    /// * `access_token` - OAuth2 bearer token with Gmail read scope
    /// * `timeout` - Upper bound for each HTTP request
    pub fn new(access_token: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            access_token: access_token.into(),
            base_url: Self::BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API root (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let mut request = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.access_token));
        for (key, value) in query {
            request = request.query(*key, value);
        }

        let mut response = request.call()?;
        response
            .body_mut()
            .read_json::<T>()
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    /// List one page of message IDs received on or after `after`
    ///
    /// # Arguments
    /// * `after` - Day filter, sent as Gmail's `after:YYYY/MM/DD` query
    /// * `page_token` - Cursor from the previous page
    /// * `max_results` - Page size (1-500)
    pub fn list_messages_after(
        &self,
        after: NaiveDate,
        page_token: Option<&str>,
        max_results: usize,
    ) -> Result<ListMessagesResponse, ProviderError> {
        let url = format!("{}/users/me/messages", self.base_url);

        let mut query = vec![
            ("q", after_query(after)),
            (
                "maxResults",
                max_results.clamp(1, Self::MAX_PAGE_SIZE).to_string(),
            ),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        self.get_json(&url, &query)
    }

    /// Get a message in `format=raw`
    pub fn get_raw_message(&self, id: &MessageId) -> Result<RawMessageResponse, ProviderError> {
        let url = format!(
            "{}/users/me/messages/{}",
            self.base_url,
            urlencoding::encode(id.as_str())
        );
        self.get_json(&url, &[("format", "raw".to_string())])
    }
}

impl MessageSource for GmailClient {
    fn list_messages(
        &self,
        after: NaiveDate,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage, ProviderError> {
        let response = self.list_messages_after(after, page_token, page_size)?;

        let message_ids: Vec<MessageId> = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect();

        debug!(
            "Listed {} message(s) after {} (estimate {:?}, more pages: {})",
            message_ids.len(),
            after,
            response.result_size_estimate,
            response.next_page_token.is_some()
        );

        Ok(MessagePage {
            message_ids,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn fetch_raw(&self, id: &MessageId) -> Result<RawMessage, ProviderError> {
        let response = self.get_raw_message(id)?;

        let raw = response.raw.ok_or_else(|| {
            ProviderError::Decode(format!("message {} has no raw content", response.id))
        })?;
        let data = decode_raw_payload(&raw).ok_or_else(|| {
            ProviderError::Decode(format!("message {} raw content is not base64", response.id))
        })?;

        Ok(RawMessage::new(MessageId::new(response.id), data))
    }
}

/// Gmail search query for messages on or after a day
pub fn after_query(date: NaiveDate) -> String {
    format!("after:{}", date.format("%Y/%m/%d"))
}

/// Decode a base64 `raw` payload
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
pub fn decode_raw_payload(data: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders.iter().find_map(|decoder| decoder.decode(data).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_after_query_uses_day_resolution() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(after_query(date), "after:2025/03/07");
    }

    #[test]
    fn test_decode_raw_payload() {
        // "Subject: Hi\r\n\r\nBody" in base64url without padding
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(b"Subject: Hi\r\n\r\nBody");
        assert_eq!(
            decode_raw_payload(&encoded),
            Some(b"Subject: Hi\r\n\r\nBody".to_vec())
        );

        let padded = BASE64_URL_SAFE.encode(b"ab");
        assert_eq!(decode_raw_payload(&padded), Some(b"ab".to_vec()));
    }

    #[test]
    fn test_decode_raw_payload_rejects_garbage() {
        assert_eq!(decode_raw_payload("!!not base64!!"), None);
    }

    #[test]
    fn test_list_response_deserializes() {
        let json = r#"{
            "messages": [{"id": "a1", "threadId": "t1"}, {"id": "a2", "threadId": "t2"}],
            "nextPageToken": "tok",
            "resultSizeEstimate": 2
        }"#;
        let response: ListMessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.messages.unwrap().len(), 2);
        assert_eq!(response.next_page_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_empty_list_response_deserializes() {
        let response: ListMessagesResponse =
            serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(response.messages.is_none());
        assert!(response.next_page_token.is_none());
    }
}
