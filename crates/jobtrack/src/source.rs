//! Message source abstraction
//!
//! The pipeline only needs two calls from a mail provider: list the ids of
//! messages received on or after a day, one page at a time, and fetch one
//! message's raw bytes.

use chrono::NaiveDate;

use crate::error::ProviderError;
use crate::models::{MessageId, RawMessage};

/// One page of a message listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    /// Message ids in provider order
    pub message_ids: Vec<MessageId>,
    /// Cursor for the next page; `None` on the final page
    pub next_page_token: Option<String>,
}

/// Paginated read access to a mailbox
pub trait MessageSource: Send + Sync {
    /// List message ids received on or after `after` (day resolution).
    ///
    /// Same-day messages reappear across runs; callers must tolerate that.
    fn list_messages(
        &self,
        after: NaiveDate,
        page_token: Option<&str>,
        page_size: usize,
    ) -> Result<MessagePage, ProviderError>;

    /// Fetch one message's raw RFC 822 payload
    fn fetch_raw(&self, id: &MessageId) -> Result<RawMessage, ProviderError>;
}
