//! Widget configuration
//!
//! Built once per embedding from the flat key/value attributes declared on
//! the embedding element. Everything here is parse-with-default: invalid or
//! absent input silently falls back and the widget always renders. No
//! validation error ever reaches the host page.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Origin of the hosted widget surface; inbound bus messages from any other
/// origin are dropped.
pub const DEFAULT_WIDGET_ORIGIN: &str = "https://widget.dockchat.app";

/// Base URL for the session-issuance and chat endpoints.
pub const DEFAULT_API_BASE: &str = "https://api.dockchat.app";

pub const DEFAULT_WIDGET_KEY: &str = "dev";
pub const DEFAULT_THEME: &str = "light";

const OFFSET_RANGE: (i64, i64) = (0, 200);
const WIDTH_RANGE: (i64, i64) = (300, 800);
const HEIGHT_RANGE: (i64, i64) = (400, 900);

pub const DEFAULT_OFFSET: i64 = 20;
pub const DEFAULT_WIDTH: i64 = 400;
pub const DEFAULT_HEIGHT: i64 = 600;

/// Which screen edge the launcher hugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Left,
    Right,
}

/// The eight theme colors. Each is always a valid hex string; invalid input
/// falls back per-field at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetColors {
    pub primary: String,
    pub launcher_bg: String,
    pub header_bg: String,
    pub header_text: String,
    pub bot_bubble_bg: String,
    pub bot_bubble_text: String,
    pub user_bubble_bg: String,
    pub user_bubble_text: String,
}

impl Default for WidgetColors {
    fn default() -> Self {
        WidgetColors {
            primary: "#4f46e5".to_string(),
            launcher_bg: "#4f46e5".to_string(),
            header_bg: "#4f46e5".to_string(),
            header_text: "#ffffff".to_string(),
            bot_bubble_bg: "#f3f4f6".to_string(),
            bot_bubble_text: "#111827".to_string(),
            user_bubble_bg: "#4f46e5".to_string(),
            user_bubble_text: "#ffffff".to_string(),
        }
    }
}

/// Partial color update, as carried by `WM_UPDATE_COLORS` and
/// `updateColors()`. Absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher_bg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_bg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_bubble_bg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_bubble_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_bubble_bg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_bubble_text: Option<String>,
}

impl WidgetColors {
    /// Merges overrides into the current palette. Each supplied value is
    /// validated; an invalid value keeps the field as it was.
    pub fn merge(&mut self, overrides: &ColorOverrides) {
        let fields = [
            (&mut self.primary, &overrides.primary),
            (&mut self.launcher_bg, &overrides.launcher_bg),
            (&mut self.header_bg, &overrides.header_bg),
            (&mut self.header_text, &overrides.header_text),
            (&mut self.bot_bubble_bg, &overrides.bot_bubble_bg),
            (&mut self.bot_bubble_text, &overrides.bot_bubble_text),
            (&mut self.user_bubble_bg, &overrides.user_bubble_bg),
            (&mut self.user_bubble_text, &overrides.user_bubble_text),
        ];
        for (current, candidate) in fields {
            if let Some(value) = candidate {
                *current = validate_hex_color(value, current);
            }
        }
    }
}

/// Configuration snapshot for one embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub widget_key: String,
    pub position: Position,
    pub offset: i64,
    pub width: i64,
    pub height: i64,
    pub theme: String,
    pub colors: WidgetColors,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        WidgetConfig {
            widget_key: DEFAULT_WIDGET_KEY.to_string(),
            position: Position::Right,
            offset: DEFAULT_OFFSET,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            theme: DEFAULT_THEME.to_string(),
            colors: WidgetColors::default(),
        }
    }
}

impl WidgetConfig {
    /// Derives a configuration from the embedding element's attributes.
    /// Recognized keys: `widget-key`, `position`, `offset`, `width`,
    /// `height`, `theme`, and `color-<field>` for each palette field.
    pub fn from_attrs(attrs: &HashMap<String, String>) -> Self {
        let defaults = WidgetColors::default();
        let color = |key: &str, fallback: &str| -> String {
            match attrs.get(key) {
                Some(v) => validate_hex_color(v, fallback),
                None => fallback.to_string(),
            }
        };

        WidgetConfig {
            widget_key: attrs
                .get("widget-key")
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| DEFAULT_WIDGET_KEY.to_string()),
            position: match attrs.get("position").map(String::as_str) {
                Some("left") => Position::Left,
                _ => Position::Right,
            },
            offset: parse_clamped(attrs.get("offset"), DEFAULT_OFFSET, OFFSET_RANGE),
            width: parse_clamped(attrs.get("width"), DEFAULT_WIDTH, WIDTH_RANGE),
            height: parse_clamped(attrs.get("height"), DEFAULT_HEIGHT, HEIGHT_RANGE),
            theme: attrs
                .get("theme")
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| DEFAULT_THEME.to_string()),
            colors: WidgetColors {
                primary: color("color-primary", &defaults.primary),
                launcher_bg: color("color-launcher-bg", &defaults.launcher_bg),
                header_bg: color("color-header-bg", &defaults.header_bg),
                header_text: color("color-header-text", &defaults.header_text),
                bot_bubble_bg: color("color-bot-bubble-bg", &defaults.bot_bubble_bg),
                bot_bubble_text: color("color-bot-bubble-text", &defaults.bot_bubble_text),
                user_bubble_bg: color("color-user-bubble-bg", &defaults.user_bubble_bg),
                user_bubble_text: color("color-user-bubble-text", &defaults.user_bubble_text),
            },
        }
    }
}

/// Returns `value` unchanged (case preserved) when it is `#` followed by
/// exactly 3 or 6 hex digits, otherwise the fallback.
pub fn validate_hex_color(value: &str, fallback: &str) -> String {
    let digits = match value.strip_prefix('#') {
        Some(rest) => rest,
        None => return fallback.to_string(),
    };
    let ok = matches!(digits.len(), 3 | 6) && digits.chars().all(|c| c.is_ascii_hexdigit());
    if ok {
        value.to_string()
    } else {
        fallback.to_string()
    }
}

/// Parses a numeric attribute, defaulting on absent or non-numeric input,
/// then clamps into the documented range.
fn parse_clamped(value: Option<&String>, default: i64, (lo, hi): (i64, i64)) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
        .clamp(lo, hi)
}
