//! Session token management
//!
//! One ephemeral bearer token per store, persisted under fixed keys so a
//! reload within the expiry window reuses it. `read` enforces the expiry
//! invariant as a side effect; `acquire` always performs a fresh issuance
//! call, so callers check `read` first when reuse is wanted.

use crate::backend::ChatBackend;
use crate::error::WidgetResult;
use crate::models::SessionToken;
use crate::store::LocalStore;

pub const SESSION_TOKEN_KEY: &str = "session.token";
pub const SESSION_EXPIRES_KEY: &str = "session.expires_at";

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct SessionManager {
    store: LocalStore,
}

impl SessionManager {
    pub fn new(store: LocalStore) -> Self {
        SessionManager { store }
    }

    /// The live session token, or `None`. Reading an expired token deletes
    /// it.
    pub fn read(&self) -> WidgetResult<Option<SessionToken>> {
        self.read_at(now_ms())
    }

    fn read_at(&self, now_ms: i64) -> WidgetResult<Option<SessionToken>> {
        let token = match self.store.get(SESSION_TOKEN_KEY)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let expires_at = self
            .store
            .get(SESSION_EXPIRES_KEY)?
            .and_then(|v| v.trim().parse::<i64>().ok());
        let Some(expires_at) = expires_at else {
            // Token without a readable expiry is unusable; drop it.
            self.invalidate()?;
            return Ok(None);
        };

        let session = SessionToken { token, expires_at };
        if session.is_valid_at(now_ms) {
            Ok(Some(session))
        } else {
            log::info!("[session] stored token expired, clearing");
            self.invalidate()?;
            Ok(None)
        }
    }

    /// Issues and persists a new session, replacing any stored one.
    pub async fn acquire(
        &self,
        backend: &dyn ChatBackend,
        widget_key: &str,
        page_url: &str,
    ) -> WidgetResult<SessionToken> {
        let grant = backend.issue_session(widget_key, page_url).await?;
        let session = SessionToken {
            token: grant.session_token,
            expires_at: now_ms() + (grant.expires_in as i64) * 1000,
        };
        self.store.set(SESSION_TOKEN_KEY, &session.token)?;
        self.store
            .set(SESSION_EXPIRES_KEY, &session.expires_at.to_string())?;
        log::info!("[session] acquired session valid until {}", session.expires_at);
        Ok(session)
    }

    /// Drops the stored session unconditionally.
    pub fn invalidate(&self) -> WidgetResult<()> {
        self.store.remove(SESSION_TOKEN_KEY)?;
        self.store.remove(SESSION_EXPIRES_KEY)?;
        Ok(())
    }
}
