//! Comment API client
//!
//! Posts and lists the comments shown under a detail page. Comments are scoped
//! by a fixed author tag plus the detail id they were written for.

use serde_json::Value;
use tracing::{debug, info};

use super::client::ApiClient;
use super::errors::FetchError;
use super::types::{Message, MessagesResponse, NewMessage};

/// Default comment API location
pub const DEFAULT_MESSAGES_URL: &str = "https://fdnd.directus.app/";

/// Author tag every comment of this site is stored under
pub const DEFAULT_MESSAGE_AUTHOR: &str = "Marcin-IO";

const MESSAGES_ENDPOINT: &str = "items/messages";

/// Comment posting errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message text must not be empty")]
    Empty,

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Clone)]
pub struct MessageClient {
    api: ApiClient,
    author: String,
}

impl MessageClient {
    pub fn new(api: ApiClient, author: &str) -> Self {
        Self {
            api,
            author: author.to_string(),
        }
    }

    /// Post a comment for a detail page. Blank text is rejected before any request.
    pub async fn post_message(&self, text: &str, detail_id: &str) -> Result<Value, MessageError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(MessageError::Empty);
        }

        let body = NewMessage {
            text,
            from: &self.author,
            for_id: detail_id,
        };

        let response = self.api.post(MESSAGES_ENDPOINT, &body).await?;
        info!(detail_id = detail_id, "Posted message");
        Ok(response)
    }

    /// Newest-first comments for a detail page. `limit = -1` returns all of them.
    pub async fn get_messages(
        &self,
        detail_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, FetchError> {
        let endpoint = messages_query(&self.author, detail_id, limit);
        let response: MessagesResponse = self.api.get_json(&endpoint).await?;
        debug!(
            detail_id = detail_id,
            count = response.data.len(),
            "Fetched messages"
        );
        Ok(response.data)
    }
}

fn messages_query(author: &str, detail_id: &str, limit: i64) -> String {
    format!(
        "{}?filter[from][_eq]={}&filter[for][_eq]={}&sort=-id&limit={}",
        MESSAGES_ENDPOINT,
        urlencoding::encode(author),
        urlencoding::encode(detail_id),
        limit
    )
}
