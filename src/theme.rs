//! Theme applier: maps the color palette to the style variables the chat
//! surface consumes. Pure derivation, no side effects.

use crate::config::WidgetColors;

/// Style-variable names paired with their current values, in a stable
/// order. The embedder writes these onto the surface's root element.
pub fn style_variables(colors: &WidgetColors) -> Vec<(&'static str, String)> {
    vec![
        ("--dockchat-primary", colors.primary.clone()),
        ("--dockchat-launcher-bg", colors.launcher_bg.clone()),
        ("--dockchat-header-bg", colors.header_bg.clone()),
        ("--dockchat-header-text", colors.header_text.clone()),
        ("--dockchat-bot-bubble-bg", colors.bot_bubble_bg.clone()),
        ("--dockchat-bot-bubble-text", colors.bot_bubble_text.clone()),
        ("--dockchat-user-bubble-bg", colors.user_bubble_bg.clone()),
        ("--dockchat-user-bubble-text", colors.user_bubble_text.clone()),
    ]
}
