//! Chat panel state machine
//!
//! Runs inside the embedded surface: owns the message list, drives one
//! streamed exchange at a time through a [`ChatBackend`], and turns the
//! error taxonomy into the right visual outcome (apologetic bubble,
//! silent stop annotation, or rate-limit banner). Text already streamed
//! into the placeholder is authoritative: a later failure never discards
//! it.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::ChatBackend;
use crate::error::WidgetError;
use crate::models::{ChatMessage, RateLimitWarning, Role};
use crate::session::{now_ms, SessionManager};

/// Suffix appended to a partially streamed answer the user stopped.
pub const STOP_MARKER: &str = " (stopped)";

/// Shown when a send fails before any answer text arrived.
pub const FALLBACK_ERROR_TEXT: &str = "Sorry, something went wrong. Please try again.";

/// Banner cooldown when a 429 arrives with no stored session to pin it to.
const DEFAULT_COOLDOWN_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPhase {
    Idle,
    AwaitingSession,
    Streaming,
    RateLimited,
}

pub struct ChatPanel {
    backend: Arc<dyn ChatBackend>,
    sessions: SessionManager,
    widget_key: String,
    page_url: String,
    messages: Vec<ChatMessage>,
    phase: PanelPhase,
    rate_limit: Option<RateLimitWarning>,
    cancel: CancellationToken,
    composing: bool,
    composition_latch: bool,
}

impl ChatPanel {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        sessions: SessionManager,
        widget_key: impl Into<String>,
        page_url: impl Into<String>,
    ) -> Self {
        ChatPanel {
            backend,
            sessions,
            widget_key: widget_key.into(),
            page_url: page_url.into(),
            messages: Vec::new(),
            phase: PanelPhase::Idle,
            rate_limit: None,
            cancel: CancellationToken::new(),
            composing: false,
            composition_latch: false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn phase(&self) -> PanelPhase {
        self.phase
    }

    pub fn rate_limit_warning(&self) -> Option<RateLimitWarning> {
        self.rate_limit
    }

    /// A send is in flight. While true, further sends are no-ops.
    pub fn loading(&self) -> bool {
        matches!(self.phase, PanelPhase::AwaitingSession | PanelPhase::Streaming)
    }

    /// Stop control for the in-flight exchange. Cancelling it releases the
    /// stream reader; the panel then annotates or removes the placeholder.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // ============ Input guards ============

    pub fn composition_start(&mut self) {
        self.composing = true;
    }

    /// Ends IME composition. A short-lived latch keeps the Enter that
    /// confirmed the composition from doubling as a submit; the latch is
    /// cleared by the next tick or consumed by the next Enter.
    pub fn composition_end(&mut self) {
        self.composing = false;
        self.composition_latch = true;
    }

    /// Whether an Enter press may submit right now.
    pub fn enter_pressed(&mut self) -> bool {
        if self.composing {
            return false;
        }
        if self.composition_latch {
            self.composition_latch = false;
            return false;
        }
        true
    }

    // ============ Countdown ============

    /// One-second cadence driver: expires the rate-limit banner and clears
    /// the composition latch. Input is not blocked during the cooldown, so
    /// the banner may outlive the `RateLimited` phase; it still dismisses
    /// exactly at its deadline.
    pub fn tick(&mut self, now_ms: i64) {
        self.composition_latch = false;
        if let Some(warning) = self.rate_limit {
            if !warning.is_active_at(now_ms) {
                self.rate_limit = None;
                if self.phase == PanelPhase::RateLimited {
                    self.phase = PanelPhase::Idle;
                }
            }
        }
    }

    /// Countdown text while the banner is up.
    pub fn rate_limit_countdown(&self, now_ms: i64) -> Option<String> {
        self.rate_limit.map(|w| w.countdown_at(now_ms))
    }

    // ============ Send ============

    /// Sends one question and streams the answer into a placeholder
    /// message. Returns the completed assistant message so the embedder can
    /// relay `WM_MESSAGE_RECEIVED`; all failure outcomes return `None`
    /// after updating the panel state.
    pub async fn send(&mut self, text: &str) -> Option<ChatMessage> {
        if self.loading() {
            log::debug!("[panel] send ignored, exchange already in flight");
            return None;
        }
        let question = text.trim().to_string();
        if question.is_empty() {
            return None;
        }

        self.messages.push(ChatMessage::new(Role::User, question.clone()));
        let placeholder = ChatMessage::new(Role::Assistant, "");
        let placeholder_id = placeholder.id.clone();
        self.messages.push(placeholder);

        self.cancel = CancellationToken::new();
        self.phase = PanelPhase::AwaitingSession;

        let session = match self.sessions.read() {
            Ok(Some(session)) => session,
            _ => {
                match self
                    .sessions
                    .acquire(self.backend.as_ref(), &self.widget_key, &self.page_url)
                    .await
                {
                    Ok(session) => session,
                    Err(WidgetError::RateLimited { retry_after_secs }) => {
                        self.enter_rate_limited(&placeholder_id, retry_after_secs);
                        return None;
                    }
                    Err(err) => {
                        self.fail_send(&placeholder_id, err);
                        return None;
                    }
                }
            }
        };

        self.phase = PanelPhase::Streaming;
        let backend = Arc::clone(&self.backend);
        let cancel = self.cancel.clone();
        let result = {
            let messages = &mut self.messages;
            let mut on_chunk = |cumulative: &str| {
                if let Some(m) = messages.iter_mut().find(|m| m.id == placeholder_id) {
                    m.text.clear();
                    m.text.push_str(cumulative);
                }
            };
            backend
                .stream_chat(&question, &session.token, cancel, &mut on_chunk)
                .await
        };

        match result {
            Ok(reply) => {
                self.phase = PanelPhase::Idle;
                if let Some(m) = self.message_mut(&placeholder_id) {
                    m.text = reply.answer;
                    m.sources = reply.sources;
                    return Some(m.clone());
                }
                None
            }
            Err(WidgetError::Cancelled) => {
                // Deliberate user action: keep what already streamed in,
                // annotated; an untouched placeholder just disappears.
                let streamed_any = self
                    .message_mut(&placeholder_id)
                    .map(|m| !m.text.is_empty())
                    .unwrap_or(false);
                if streamed_any {
                    if let Some(m) = self.message_mut(&placeholder_id) {
                        m.text.push_str(STOP_MARKER);
                    }
                } else {
                    self.remove_message(&placeholder_id);
                }
                self.phase = PanelPhase::Idle;
                None
            }
            Err(WidgetError::RateLimited { retry_after_secs }) => {
                self.enter_rate_limited(&placeholder_id, retry_after_secs);
                None
            }
            Err(err) => {
                self.fail_send(&placeholder_id, err);
                None
            }
        }
    }

    // ============ Outcome helpers ============

    fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    fn remove_message(&mut self, id: &str) {
        self.messages.retain(|m| m.id != id);
    }

    /// Generic failure: an untouched placeholder becomes the apologetic
    /// message; a partially filled one keeps its text and the error is
    /// swallowed.
    fn fail_send(&mut self, placeholder_id: &str, err: WidgetError) {
        log::error!("[panel] send failed: {}", err);
        if let Some(m) = self.message_mut(placeholder_id) {
            if m.text.is_empty() {
                m.text = FALLBACK_ERROR_TEXT.to_string();
            }
        }
        self.phase = PanelPhase::Idle;
    }

    /// Rate limit: the placeholder never becomes a bubble; the banner's
    /// deadline is the stored session's remaining expiry window, or a
    /// server-suggested (else fixed) cooldown when no session is stored.
    fn enter_rate_limited(&mut self, placeholder_id: &str, retry_after_secs: Option<u64>) {
        self.remove_message(placeholder_id);
        let retry_at = match self.sessions.read() {
            Ok(Some(session)) => session.expires_at,
            _ => now_ms() + (retry_after_secs.unwrap_or(DEFAULT_COOLDOWN_SECS) as i64) * 1000,
        };
        if let Err(err) = self.sessions.invalidate() {
            log::warn!("[panel] failed to clear session after 429: {}", err);
        }
        self.rate_limit = Some(RateLimitWarning { retry_at });
        self.phase = PanelPhase::RateLimited;
        log::info!("[panel] rate limited until {}", retry_at);
    }
}
