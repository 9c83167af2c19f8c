//! Mutual-exclusion lock layer on top of sessions.
//!
//! Write access to the service is gated by a per-session flag stored under
//! the `"lock"` key as a literal string and read as a tri-state:
//!
//! - `"true"` or no flag at all: the caller may proceed
//! - anything else (in practice the literal `"false"`): the caller is blocked
//!
//! The stored strings follow a legacy convention that existing durable
//! records already use, so it must not be flipped: [`lock`] writes `"true"`
//! into the calling session (its own subsequent checks keep passing) and
//! [`unlock`] writes `"false"` (the session's checks block until the flag is
//! reconciled away). On the durable side, `lock` mirrors the flag into an
//! already-existing record in place, while `unlock` unconditionally
//! overwrites the record with a fresh timestamp and commits the whole
//! store.
//!
//! Every entry point starts (or creates) the request's session first, so all
//! of them participate in cookie issuance. `lock`, `unlock`, and
//! [`websocket_unlock`] hold the manager gate for their full duration;
//! [`check_lock`] relies on the gate held internally by session start only.
//!
//! [`lock`]: LockCoordinator::lock
//! [`unlock`]: LockCoordinator::unlock
//! [`check_lock`]: LockCoordinator::check_lock
//! [`websocket_unlock`]: LockCoordinator::websocket_unlock

use crate::manager::SessionManager;
use crate::record::SessionRecord;
use crate::traits::SessionHandle;
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Session key the lock flag is stored under.
pub const LOCK_KEY: &str = "lock";

/// Gates concurrent write operations across the service.
pub struct LockCoordinator {
    manager: Arc<SessionManager>,
}

impl LockCoordinator {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    /// Whether the request's session may proceed with a write operation.
    ///
    /// Returns `true` when the session has no lock flag or the flag is
    /// `"true"`. Returns `false` otherwise, refreshing the durable record's
    /// last-accessed timestamp for that session so an active blocker is not
    /// pruned at the next restart.
    pub async fn check_lock(&self, req: &HeaderMap, res: &mut HeaderMap) -> bool {
        let Some(session) = self.manager.start(req, res).await else {
            // A session that cannot be resolved has never been locked.
            tracing::warn!("check_lock could not resolve a session, passing");
            return true;
        };

        match session.get(LOCK_KEY).await.as_deref() {
            None | Some("true") => true,
            Some(_) => {
                let records = self.manager.records();
                if let Some(mut record) = records.get(session.id()).await {
                    record.last_accessed = SystemTime::now();
                    records.insert(session.id(), record).await;
                }
                false
            }
        }
    }

    /// Take the write lock for the request's session.
    ///
    /// Writes `"true"` into the session and, if a durable record for the
    /// session already exists, mirrors the flag into it. Does not commit.
    pub async fn lock(&self, req: &HeaderMap, res: &mut HeaderMap) {
        let _guard = self.manager.guard().await;
        let Some(session) = self.manager.start_session(req, res).await else {
            return;
        };

        self.write_flag(&session, "true").await;

        let records = self.manager.records();
        if let Some(mut record) = records.get(session.id()).await {
            record.lock = "true".to_string();
            records.insert(session.id(), record).await;
        }

        tracing::info!(sid = %session.id(), "Session locked");
    }

    /// Release the write lock for the request's session.
    ///
    /// Writes `"false"` into the session, unconditionally overwrites the
    /// durable record with a fresh timestamp, and commits the record store.
    pub async fn unlock(&self, req: &HeaderMap, res: &mut HeaderMap) {
        let _guard = self.manager.guard().await;
        let Some(session) = self.manager.start_session(req, res).await else {
            return;
        };

        self.write_flag(&session, "false").await;
        self.commit(session.id()).await;

        tracing::info!(sid = %session.id(), "Session unlocked");
    }

    /// Release the write lock from a transport without a response side.
    ///
    /// WebSocket frames carry the request headers only, so no cookie can be
    /// issued here: the session identifier is taken from the request cookie
    /// when present and falls back to the configured single-tenant
    /// identifier otherwise. The session is read (or created) directly from
    /// the backend.
    pub async fn websocket_unlock(&self, req: &HeaderMap) {
        let _guard = self.manager.guard().await;

        let sid = self
            .manager
            .request_sid(req)
            .unwrap_or_else(|| self.manager.config().fallback_session_id.clone());

        let session = match self.manager.provider().read(&sid).await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(%error, sid = %sid, "Failed to read session for websocket unlock");
                return;
            }
        };

        self.write_flag(&session, "false").await;
        self.commit(&sid).await;

        tracing::info!(sid = %sid, "Session unlocked over websocket");
    }

    async fn write_flag(&self, session: &SessionHandle, flag: &str) {
        if let Err(error) = session.set(LOCK_KEY, flag).await {
            tracing::warn!(%error, "Failed to write lock flag to session");
        }
    }

    async fn commit(&self, sid: &str) {
        let records = self.manager.records();
        records.insert(sid, SessionRecord::now("false")).await;
        if let Err(error) = records.save().await {
            tracing::warn!(%error, "Failed to commit lock records");
        }
    }
}
