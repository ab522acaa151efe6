//! Data models shared across the widget core

use serde::{Deserialize, Serialize};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the panel's list. `id` is generated locally and only
/// used to reconcile streaming updates against the right bubble; it carries
/// no server-side meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            sources: Vec::new(),
        }
    }
}

/// Classification of a source citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Url,
    Image,
}

/// A citation attached to an assistant answer, already resolved against the
/// resource-center base (see `sources::resolve_sources`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Resource descriptor as the chat endpoint reports it, before resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct RawResource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Completion value of one streamed exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatReply {
    pub answer: String,
    pub sources: Vec<Source>,
}

/// Bearer credential for the chat endpoint, persisted in the local store.
/// Valid only while `now < expires_at` (epoch milliseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: i64,
}

impl SessionToken {
    pub fn is_valid_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }
}

/// Issuance wire shape: the server grants a token plus a lifetime in
/// seconds, converted to an absolute `SessionToken` at persist time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub session_token: String,
    pub expires_in: u64,
}

/// Ephemeral rate-limit banner state. Never persisted; cleared once
/// `now >= retry_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWarning {
    pub retry_at: i64,
}

impl RateLimitWarning {
    pub fn is_active_at(&self, now_ms: i64) -> bool {
        now_ms < self.retry_at
    }

    /// Human-readable countdown, re-evaluated every tick while the banner
    /// is shown.
    pub fn countdown_at(&self, now_ms: i64) -> String {
        let remaining_secs = (self.retry_at - now_ms).max(0) / 1000;
        if remaining_secs >= 60 {
            format!("try again in {}m {}s", remaining_secs / 60, remaining_secs % 60)
        } else {
            format!("try again in {}s", remaining_secs)
        }
    }
}
