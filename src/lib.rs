//! DockChat widget core
//!
//! The protocol and state-machine layer behind the embeddable chat widget:
//! the launcher shell a host page embeds, the origin-checked message bus
//! between the host document and the hosted chat surface, the session
//! token manager, and the streaming chat client the panel renders from.
//! Rendering itself, and the admin/analytics services, live elsewhere;
//! this crate is everything between "user pressed the launcher" and
//! "assistant answer finished streaming".

// Module declarations
pub mod backend;
pub mod bus;
pub mod config;
pub mod error;
pub mod launcher;
pub mod models;
pub mod panel;
pub mod paths;
pub mod session;
pub mod sources;
pub mod store;
pub mod stream;
pub mod theme;

// Re-exports for the embedding surface
pub use backend::{ChatBackend, HttpChatBackend};
pub use bus::{MessagePort, WidgetMessage};
pub use config::{ColorOverrides, Position, WidgetColors, WidgetConfig};
pub use error::{WidgetError, WidgetResult};
pub use launcher::{HandlerId, LauncherState, WidgetEvent, WidgetInstance};
pub use models::{ChatMessage, ChatReply, RateLimitWarning, Role, SessionToken, Source, SourceKind};
pub use panel::{ChatPanel, PanelPhase};
pub use session::SessionManager;
pub use store::LocalStore;
pub use stream::consume_chat_stream;
