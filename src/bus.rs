//! Cross-document message bus
//!
//! The host page and the embedded chat surface share no state; every
//! exchange travels as one of these tagged messages. Inbound dispatch is
//! origin-checked: a message from any origin other than the configured
//! widget origin is dropped exactly like a malformed one. That drop is a
//! security boundary, not an error path, so nothing observable happens and
//! only internal debug logging is allowed.

use serde::{Deserialize, Serialize};

use crate::config::{ColorOverrides, Position, WidgetColors};
use crate::models::ChatMessage;

/// Every message that may cross the document boundary, in either
/// direction. Wire tag is the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WidgetMessage {
    /// Host → surface: init payload, sent once the panel is open and the
    /// surface has announced readiness (in either order).
    #[serde(rename = "WM_INIT", rename_all = "camelCase")]
    Init {
        widget_key: String,
        page_url: String,
        theme: String,
        position: Position,
        colors: WidgetColors,
    },
    /// Host → surface: the panel was closed.
    #[serde(rename = "WM_CLOSE")]
    Close,
    /// Either direction: partial palette update.
    #[serde(rename = "WM_UPDATE_COLORS")]
    UpdateColors { colors: ColorOverrides },
    /// Surface → host: the surface finished booting.
    #[serde(rename = "WM_WIDGET_READY")]
    WidgetReady,
    /// Surface → host: the user asked the surface to close the panel.
    #[serde(rename = "WM_REQUEST_CLOSE")]
    RequestClose,
    /// Surface → host: a user message went out.
    #[serde(rename = "WM_MESSAGE_SENT")]
    MessageSent { message: ChatMessage },
    /// Surface → host: an assistant answer completed.
    #[serde(rename = "WM_MESSAGE_RECEIVED")]
    MessageReceived { message: ChatMessage },
}

/// Outbound half of the bus. The launcher pins `target_origin` to the
/// configured widget origin on every post.
pub trait MessagePort {
    fn post(&mut self, message: &WidgetMessage, target_origin: &str);
}

/// Origin-checked inbound dispatch. Returns the decoded message only when
/// the sender's origin is the configured widget origin; foreign and
/// malformed input are indistinguishable from outside.
pub fn decode(widget_origin: &str, origin: &str, raw: &str) -> Option<WidgetMessage> {
    if origin != widget_origin {
        log::debug!("[bus] dropped message from foreign origin {}", origin);
        return None;
    }
    match serde_json::from_str::<WidgetMessage>(raw) {
        Ok(message) => Some(message),
        Err(e) => {
            log::debug!("[bus] dropped malformed message: {}", e);
            None
        }
    }
}
