//! Launcher shell
//!
//! One `WidgetInstance` per embedding owns the floating-button state, the
//! host-page event registry, and the outbound half of the message bus. No
//! module-level state: multiple embeddings on one page get independent
//! instances with their own `new`/`destroy` lifecycle.

use serde_json::Value;

use crate::bus::{decode, MessagePort, WidgetMessage};
use crate::config::{ColorOverrides, WidgetConfig, DEFAULT_WIDGET_ORIGIN};

/// Panel visual state. `Opening` spans two animation frames so the CSS
/// transition on the freshly attached panel registers before it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherState {
    Closed,
    Opening { frames_left: u8 },
    Open,
}

const OPENING_FRAMES: u8 = 2;

/// Host-page event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetEvent {
    Open,
    Close,
    Ready,
    Message,
    MessageSent,
    MessageReceived,
}

impl WidgetEvent {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "onOpen" => Some(WidgetEvent::Open),
            "onClose" => Some(WidgetEvent::Close),
            "onReady" => Some(WidgetEvent::Ready),
            "onMessage" => Some(WidgetEvent::Message),
            "onMessageSent" => Some(WidgetEvent::MessageSent),
            "onMessageReceived" => Some(WidgetEvent::MessageReceived),
            _ => None,
        }
    }
}

/// Detaches a handler registered with [`WidgetInstance::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&Value)>;

pub struct WidgetInstance {
    config: WidgetConfig,
    page_url: String,
    widget_origin: String,
    state: LauncherState,
    ready: bool,
    destroyed: bool,
    port: Box<dyn MessagePort>,
    handlers: Vec<(HandlerId, WidgetEvent, Handler)>,
    next_handler_id: u64,
}

impl WidgetInstance {
    pub fn new(config: WidgetConfig, page_url: impl Into<String>, port: Box<dyn MessagePort>) -> Self {
        Self::with_origin(config, page_url, DEFAULT_WIDGET_ORIGIN, port)
    }

    pub fn with_origin(
        config: WidgetConfig,
        page_url: impl Into<String>,
        widget_origin: impl Into<String>,
        port: Box<dyn MessagePort>,
    ) -> Self {
        WidgetInstance {
            config,
            page_url: page_url.into(),
            widget_origin: widget_origin.into(),
            state: LauncherState::Closed,
            ready: false,
            destroyed: false,
            port,
            handlers: Vec::new(),
            next_handler_id: 0,
        }
    }

    // ============ Control surface ============

    pub fn open(&mut self) {
        if self.destroyed || self.is_open() {
            return;
        }
        self.state = LauncherState::Opening {
            frames_left: OPENING_FRAMES,
        };
        log::info!("[launcher] opening panel");
        if self.ready {
            self.send_init();
        }
        self.emit(WidgetEvent::Open, &Value::Null);
    }

    pub fn close(&mut self) {
        if self.destroyed || self.state == LauncherState::Closed {
            return;
        }
        self.state = LauncherState::Closed;
        self.port.post(&WidgetMessage::Close, &self.widget_origin);
        self.emit(WidgetEvent::Close, &Value::Null);
    }

    pub fn toggle(&mut self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    /// Escape key routes to close, same as the overlay click.
    pub fn escape_pressed(&mut self) {
        self.close();
    }

    pub fn overlay_clicked(&mut self) {
        self.close();
    }

    /// Advances the two-frame opening transition. Driven by the embedder's
    /// animation-frame callback; a no-op in any settled state.
    pub fn animation_frame(&mut self) {
        if let LauncherState::Opening { frames_left } = self.state {
            self.state = if frames_left <= 1 {
                LauncherState::Open
            } else {
                LauncherState::Opening {
                    frames_left: frames_left - 1,
                }
            };
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, LauncherState::Closed)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn state(&self) -> LauncherState {
        self.state
    }

    /// Snapshot copy of the current configuration.
    pub fn config(&self) -> WidgetConfig {
        self.config.clone()
    }

    /// Merges a palette update. Flushed to the surface only while the panel
    /// is open and the surface is ready; otherwise the merge alone suffices,
    /// since the next `WM_INIT` carries the full current palette.
    pub fn update_colors(&mut self, overrides: &ColorOverrides) {
        if self.destroyed {
            return;
        }
        self.config.colors.merge(overrides);
        if self.is_open() && self.ready {
            self.port.post(
                &WidgetMessage::UpdateColors {
                    colors: overrides.clone(),
                },
                &self.widget_origin,
            );
        }
    }

    // ============ Event registry ============

    /// Registers a host-page handler. Unknown event names are rejected with
    /// a warning; the returned `None` is the no-op unsubscribe.
    pub fn on(&mut self, event_name: &str, handler: Handler) -> Option<HandlerId> {
        let Some(event) = WidgetEvent::from_name(event_name) else {
            log::warn!("[launcher] unknown event name {:?}", event_name);
            return None;
        };
        let id = HandlerId(self.next_handler_id);
        self.next_handler_id += 1;
        self.handlers.push((id, event, handler));
        Some(id)
    }

    /// Detaches a handler; it is never invoked again.
    pub fn off(&mut self, id: HandlerId) {
        self.handlers.retain(|(handler_id, _, _)| *handler_id != id);
    }

    fn emit(&mut self, event: WidgetEvent, payload: &Value) {
        for (_, registered, handler) in self.handlers.iter_mut() {
            if *registered == event {
                handler(payload);
            }
        }
    }

    // ============ Inbound dispatch ============

    /// Handles one raw cross-document message. Foreign origins and
    /// malformed payloads fall out in `bus::decode` with no observable
    /// effect.
    pub fn handle_message(&mut self, origin: &str, raw: &str) {
        if self.destroyed {
            return;
        }
        let Some(message) = decode(&self.widget_origin, origin, raw) else {
            return;
        };
        match message {
            WidgetMessage::WidgetReady => {
                self.ready = true;
                if self.is_open() {
                    self.send_init();
                }
                self.emit(WidgetEvent::Ready, &Value::Null);
            }
            WidgetMessage::RequestClose => self.close(),
            WidgetMessage::UpdateColors { colors } => {
                self.config.colors.merge(&colors);
                if self.is_open() && self.ready {
                    // The surface gets the merged palette back through the
                    // init payload's color channel.
                    self.send_init();
                }
            }
            WidgetMessage::MessageSent { message } => {
                let payload = serde_json::to_value(&message).unwrap_or(Value::Null);
                self.emit(WidgetEvent::MessageSent, &payload);
                self.emit(WidgetEvent::Message, &payload);
            }
            WidgetMessage::MessageReceived { message } => {
                let payload = serde_json::to_value(&message).unwrap_or(Value::Null);
                self.emit(WidgetEvent::MessageReceived, &payload);
                self.emit(WidgetEvent::Message, &payload);
            }
            // Host-outbound kinds arriving inbound are protocol noise.
            WidgetMessage::Init { .. } | WidgetMessage::Close => {
                log::debug!("[launcher] ignoring host-outbound message from surface");
            }
        }
    }

    fn send_init(&mut self) {
        self.port.post(
            &WidgetMessage::Init {
                widget_key: self.config.widget_key.clone(),
                page_url: self.page_url.clone(),
                theme: self.config.theme.clone(),
                position: self.config.position,
                colors: self.config.colors.clone(),
            },
            &self.widget_origin,
        );
    }

    /// Tears the instance down: closes the panel and drops every handler.
    /// All entry points are no-ops afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.close();
        self.handlers.clear();
        self.destroyed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const ORIGIN: &str = "https://widget.example.test";

    #[derive(Default)]
    struct RecordingPort {
        posts: Rc<RefCell<Vec<(WidgetMessage, String)>>>,
    }

    impl MessagePort for RecordingPort {
        fn post(&mut self, message: &WidgetMessage, target_origin: &str) {
            self.posts
                .borrow_mut()
                .push((message.clone(), target_origin.to_string()));
        }
    }

    fn instance() -> (WidgetInstance, Rc<RefCell<Vec<(WidgetMessage, String)>>>) {
        let port = RecordingPort::default();
        let posts = Rc::clone(&port.posts);
        let widget = WidgetInstance::with_origin(
            WidgetConfig::default(),
            "https://host.example/page",
            ORIGIN,
            Box::new(port),
        );
        (widget, posts)
    }

    fn init_count(posts: &Rc<RefCell<Vec<(WidgetMessage, String)>>>) -> usize {
        posts
            .borrow()
            .iter()
            .filter(|(m, _)| matches!(m, WidgetMessage::Init { .. }))
            .count()
    }

    fn ready_raw() -> String {
        r#"{"type":"WM_WIDGET_READY"}"#.to_string()
    }

    #[test]
    fn init_is_never_sent_while_closed() {
        let (mut widget, posts) = instance();
        widget.handle_message(ORIGIN, &ready_raw());
        assert!(widget.is_ready());
        assert_eq!(init_count(&posts), 0);
    }

    #[test]
    fn init_sent_once_on_ready_then_open() {
        let (mut widget, posts) = instance();
        widget.handle_message(ORIGIN, &ready_raw());
        widget.open();
        assert_eq!(init_count(&posts), 1);
    }

    #[test]
    fn init_sent_once_on_open_then_ready() {
        let (mut widget, posts) = instance();
        widget.open();
        assert_eq!(init_count(&posts), 0);
        widget.handle_message(ORIGIN, &ready_raw());
        assert_eq!(init_count(&posts), 1);
    }

    #[test]
    fn init_targets_the_widget_origin() {
        let (mut widget, posts) = instance();
        widget.open();
        widget.handle_message(ORIGIN, &ready_raw());
        assert!(posts.borrow().iter().all(|(_, target)| target == ORIGIN));
    }

    #[test]
    fn foreign_origin_causes_no_observable_change() {
        let (mut widget, posts) = instance();
        let seen = Rc::new(RefCell::new(0u32));
        let seen_in_handler = Rc::clone(&seen);
        widget.on("onReady", Box::new(move |_| *seen_in_handler.borrow_mut() += 1));

        widget.handle_message("https://evil.example", &ready_raw());
        widget.open();

        assert!(!widget.is_ready());
        assert_eq!(init_count(&posts), 0);
        assert_eq!(*seen.borrow(), 0);
    }

    #[test]
    fn close_posts_wm_close_once_per_transition() {
        let (mut widget, posts) = instance();
        widget.open();
        widget.close();
        widget.close(); // settled, must be a no-op
        let closes = posts
            .borrow()
            .iter()
            .filter(|(m, _)| matches!(m, WidgetMessage::Close))
            .count();
        assert_eq!(closes, 1);
    }

    #[test]
    fn reopening_resends_init() {
        let (mut widget, posts) = instance();
        widget.handle_message(ORIGIN, &ready_raw());
        widget.open();
        widget.close();
        widget.open();
        assert_eq!(init_count(&posts), 2);
    }

    #[test]
    fn opening_settles_after_two_frames() {
        let (mut widget, _) = instance();
        widget.open();
        assert_eq!(widget.state(), LauncherState::Opening { frames_left: 2 });
        assert!(widget.is_open());
        widget.animation_frame();
        assert_eq!(widget.state(), LauncherState::Opening { frames_left: 1 });
        widget.animation_frame();
        assert_eq!(widget.state(), LauncherState::Open);
        widget.animation_frame(); // settled, no-op
        assert_eq!(widget.state(), LauncherState::Open);
    }

    #[test]
    fn toggle_escape_and_overlay_route_to_transitions() {
        let (mut widget, _) = instance();
        widget.toggle();
        assert!(widget.is_open());
        widget.escape_pressed();
        assert!(!widget.is_open());
        widget.toggle();
        widget.overlay_clicked();
        assert!(!widget.is_open());
    }

    #[test]
    fn update_colors_is_retained_but_not_flushed_while_closed() {
        let (mut widget, posts) = instance();
        widget.update_colors(&ColorOverrides {
            primary: Some("#bada55".to_string()),
            ..Default::default()
        });
        assert_eq!(widget.config().colors.primary, "#bada55");
        assert!(posts.borrow().is_empty());

        // Next valid window flushes through the init payload.
        widget.handle_message(ORIGIN, &ready_raw());
        widget.open();
        let posts = posts.borrow();
        let init_colors = posts
            .iter()
            .find_map(|(m, _)| match m {
                WidgetMessage::Init { colors, .. } => Some(colors.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(init_colors.primary, "#bada55");
    }

    #[test]
    fn update_colors_flushes_while_open_and_ready() {
        let (mut widget, posts) = instance();
        widget.open();
        widget.handle_message(ORIGIN, &ready_raw());
        widget.update_colors(&ColorOverrides {
            header_bg: Some("#000".to_string()),
            ..Default::default()
        });
        assert!(posts
            .borrow()
            .iter()
            .any(|(m, _)| matches!(m, WidgetMessage::UpdateColors { .. })));
    }

    #[test]
    fn inbound_color_update_rebroadcasts_init_when_open_and_ready() {
        let (mut widget, posts) = instance();
        widget.open();
        widget.handle_message(ORIGIN, &ready_raw());
        assert_eq!(init_count(&posts), 1);

        widget.handle_message(
            ORIGIN,
            r##"{"type":"WM_UPDATE_COLORS","colors":{"primary":"#123"}}"##,
        );
        assert_eq!(widget.config().colors.primary, "#123");
        assert_eq!(init_count(&posts), 2);
    }

    #[test]
    fn message_events_fire_specific_and_generic_channels() {
        let (mut widget, _) = instance();
        let log = Rc::new(RefCell::new(Vec::<&'static str>::new()));
        let sent_log = Rc::clone(&log);
        widget.on("onMessageSent", Box::new(move |_| sent_log.borrow_mut().push("sent")));
        let generic_log = Rc::clone(&log);
        widget.on("onMessage", Box::new(move |_| generic_log.borrow_mut().push("generic")));

        widget.handle_message(
            ORIGIN,
            r#"{"type":"WM_MESSAGE_SENT","message":{"id":"1","role":"user","text":"hi"}}"#,
        );
        assert_eq!(*log.borrow(), vec!["sent", "generic"]);
    }

    #[test]
    fn unsubscribed_handler_is_never_invoked_again() {
        let (mut widget, _) = instance();
        let count = Rc::new(RefCell::new(0u32));
        let counted = Rc::clone(&count);
        let id = widget
            .on("onClose", Box::new(move |_| *counted.borrow_mut() += 1))
            .unwrap();

        widget.open();
        widget.close();
        assert_eq!(*count.borrow(), 1);

        widget.off(id);
        widget.open();
        widget.close();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn unknown_event_name_returns_the_noop_unsubscribe() {
        let (mut widget, _) = instance();
        assert!(widget.on("onTeleport", Box::new(|_| {})).is_none());
    }

    #[test]
    fn destroy_drops_handlers_and_freezes_the_instance() {
        let (mut widget, posts) = instance();
        let count = Rc::new(RefCell::new(0u32));
        let counted = Rc::clone(&count);
        widget.on("onOpen", Box::new(move |_| *counted.borrow_mut() += 1));

        widget.destroy();
        widget.open();
        widget.handle_message(ORIGIN, &ready_raw());

        assert!(!widget.is_open());
        assert_eq!(*count.borrow(), 0);
        assert_eq!(init_count(&posts), 0);
    }
}
