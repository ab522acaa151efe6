//! Chat endpoint access
//!
//! `ChatBackend` is the seam between the UI state machine and the network:
//! session issuance plus one streamed chat exchange. The HTTP
//! implementation classifies responses into the widget's error taxonomy.
//! It never retries; resubmitting is the user's decision.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_API_BASE;
use crate::error::{WidgetError, WidgetResult};
use crate::models::{ChatReply, SessionGrant};
use crate::stream::consume_chat_stream;

pub const SESSION_ENDPOINT: &str = "/widget/session";
pub const CHAT_ENDPOINT: &str = "/widget/chat";

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Issues a fresh session for `(widget_key, page_url)`.
    async fn issue_session(&self, widget_key: &str, page_url: &str) -> WidgetResult<SessionGrant>;

    /// Sends one question and consumes the streamed answer. `on_chunk`
    /// receives the cumulative text; the reply is the completion value.
    async fn stream_chat(
        &self,
        question: &str,
        session_token: &str,
        cancel: CancellationToken,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> WidgetResult<ChatReply>;
}

/// Production backend over reqwest.
pub struct HttpChatBackend {
    http: reqwest::Client,
    api_base: String,
}

impl HttpChatBackend {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        HttpChatBackend {
            http: reqwest::Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_base: api_base.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base.trim_end_matches('/'), path)
    }
}

impl Default for HttpChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn issue_session(&self, widget_key: &str, page_url: &str) -> WidgetResult<SessionGrant> {
        let url = self.endpoint(SESSION_ENDPOINT);
        log::info!("[backend] issuing session for key={}", widget_key);
        let response = self
            .http
            .post(&url)
            .json(&json!({ "widgetKey": widget_key, "pageUrl": page_url }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(WidgetError::RateLimited {
                retry_after_secs: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WidgetError::Transport {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<SessionGrant>().await?)
    }

    async fn stream_chat(
        &self,
        question: &str,
        session_token: &str,
        cancel: CancellationToken,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> WidgetResult<ChatReply> {
        let url = self.endpoint(CHAT_ENDPOINT);
        let response = self
            .http
            .post(&url)
            .bearer_auth(session_token)
            .json(&json!({ "question": question }))
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(WidgetError::RateLimited {
                retry_after_secs: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            log::error!("[backend] chat request failed with {}", status);
            return Err(WidgetError::Transport {
                status: status.as_u16(),
                message,
            });
        }

        consume_chat_stream(response.bytes_stream(), cancel, on_chunk).await
    }
}

/// Seconds from a `Retry-After` header, when the server sent one.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}
