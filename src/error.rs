//! Crate-wide error type.
//!
//! One coarse enum covers every failure the widget core can surface. The
//! streaming variants (`RateLimited`, `Cancelled`, `Timeout`, `Stream`,
//! `Transport`) mirror the distinct UI treatments each one gets: a cooldown
//! banner, silence, an apologetic bubble, and so on. Cancellation is user
//! intent and must never be rendered as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WidgetError {
    /// The server answered 429. Carries the `Retry-After` hint in seconds
    /// when the response included one.
    #[error("rate limited")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The consumer stopped the stream via its cancellation token.
    #[error("stream cancelled")]
    Cancelled,

    /// The five-minute wall-clock budget for one streamed exchange ran out.
    #[error("stream timed out")]
    Timeout,

    /// A server-signaled mid-stream error frame, or a failed chunk read.
    /// The `Stream error:` prefix is load-bearing: line handling during
    /// consumption swallows every parse failure except errors rendering
    /// with this substring (see `stream::consume_chat_stream`).
    #[error("Stream error: {0}")]
    Stream(String),

    /// Non-2xx, non-429 HTTP response, or a response with no readable body.
    #[error("transport error ({status}): {message}")]
    Transport { status: u16, message: String },

    /// Connection-level failure before or between chunks.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Local key-value store failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// JSON serialization / deserialization failure outside stream frames.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure while resolving the store location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WidgetResult<T> = Result<T, WidgetError>;
