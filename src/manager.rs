//! Session manager: cookie issuance, lookup, destruction, and gc.
//!
//! The manager owns one coarse gate (a single mutex per manager instance)
//! that serializes session creation, destruction, gc sweeps, and lock
//! mutations. Session volume on an admin surface is low, so the simplicity
//! wins over per-identifier locking; a hung backend call does hold the gate
//! for every caller, and there is no timeout on backend calls.

use crate::config::ManagerConfig;
use crate::error::{LocksideError, Result};
use crate::lock::LOCK_KEY;
use crate::record::RecordStore;
use crate::registry::ProviderRegistry;
use crate::traits::{Provider, SessionHandle};
use axum::http::{header, HeaderMap, HeaderValue};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::Cookie;
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Durable lock records older than this are pruned during
/// [`SessionManager::initialize`].
const RECORD_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Orchestrates cookie-backed sessions over a pluggable storage backend.
pub struct SessionManager {
    config: ManagerConfig,
    provider: Arc<dyn Provider>,
    records: Arc<dyn RecordStore>,
    gate: Mutex<()>,
}

impl SessionManager {
    /// Construct a manager using the backend named by `config.provider`.
    ///
    /// Fails with [`LocksideError::UnknownProvider`] if no backend is
    /// registered under that name.
    pub fn new(
        registry: &ProviderRegistry,
        config: ManagerConfig,
        records: Arc<dyn RecordStore>,
    ) -> Result<Self> {
        let provider = registry
            .get(&config.provider)
            .ok_or_else(|| LocksideError::unknown_provider(&config.provider))?;

        Ok(Self {
            config,
            provider,
            records,
            gate: Mutex::new(()),
        })
    }

    /// Generate a fresh session identifier: 256 bits of OS randomness,
    /// URL-safe base64 encoded, so the value is cookie-safe as-is.
    ///
    /// A randomness failure is an error for this call; an empty or weak
    /// identifier is never returned.
    pub fn generate_id(&self) -> Result<String> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|error| LocksideError::identifier_generation(error.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Resolve the request's session, creating one if the request carries no
    /// valid cookie.
    ///
    /// On creation, a Set-Cookie header is appended to `res` with Path=/,
    /// HttpOnly, and both Max-Age and Expires derived from the configured
    /// max lifetime. On a present cookie the identifier is percent-unescaped
    /// and read from the backend (a backend miss creates the session).
    ///
    /// This call never fails: backend errors are reported through tracing
    /// and degrade to `None`, which callers must treat defensively.
    pub async fn start(&self, req: &HeaderMap, res: &mut HeaderMap) -> Option<SessionHandle> {
        let _guard = self.gate.lock().await;
        self.start_session(req, res).await
    }

    /// [`start`](Self::start) without acquiring the gate; the caller must
    /// hold the guard from [`guard`](Self::guard).
    pub(crate) async fn start_session(
        &self,
        req: &HeaderMap,
        res: &mut HeaderMap,
    ) -> Option<SessionHandle> {
        if let Some(sid) = self.request_sid(req) {
            return match self.provider.read(&sid).await {
                Ok(session) => Some(session),
                Err(error) => {
                    tracing::warn!(%error, "Failed to read session from backend");
                    None
                }
            };
        }

        let sid = match self.generate_id() {
            Ok(sid) => sid,
            Err(error) => {
                tracing::error!(%error, "Failed to generate session identifier");
                return None;
            }
        };

        let session = match self.provider.init(&sid).await {
            Ok(session) => session,
            Err(error) => {
                tracing::warn!(%error, "Failed to initialize session in backend");
                return None;
            }
        };

        self.issue_cookie(res, &sid);
        tracing::debug!(sid = %sid, "Created session");
        Some(session)
    }

    /// Destroy the request's session and instruct the client to drop its
    /// cookie. No-op if the request carries no cookie.
    pub async fn end(&self, req: &HeaderMap, res: &mut HeaderMap) {
        let Some(sid) = self.request_sid(req) else {
            return;
        };

        let _guard = self.gate.lock().await;
        if let Err(error) = self.provider.destroy(&sid).await {
            tracing::warn!(%error, "Failed to destroy session in backend");
        }

        let cookie = Cookie::build((self.config.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .max_age(CookieDuration::seconds(-1))
            .expires(OffsetDateTime::now_utc())
            .build();
        append_set_cookie(res, &cookie);
        tracing::debug!(sid = %sid, "Destroyed session");
    }

    /// Reconcile durable lock records into live session state.
    ///
    /// Called once at startup: records untouched for more than 24 hours are
    /// pruned; for the rest, the durable lock flag is copied into a freshly
    /// read session so lock state survives a restart. A record whose session
    /// cannot be read or written is skipped with a warning; one bad record
    /// does not stop the sweep.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.gate.lock().await;

        for (sid, record) in self.records.entries().await {
            if record.age() >= RECORD_RETENTION {
                self.records.remove(&sid).await;
                tracing::debug!(sid = %sid, "Pruned stale lock record");
                continue;
            }

            match self.provider.read(&sid).await {
                Ok(session) => {
                    if let Err(error) = session.set(LOCK_KEY, &record.lock).await {
                        tracing::warn!(%error, sid = %sid, "Failed to restore lock flag");
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, sid = %sid, "Failed to read session for lock record");
                }
            }
        }

        Ok(())
    }

    /// Spawn the recurring gc task.
    ///
    /// Sweeps immediately, then re-arms after every max-lifetime interval
    /// for the life of the process, or until the returned handle is shut
    /// down. Each sweep holds the manager gate.
    pub fn spawn_gc(self: &Arc<Self>) -> GcHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let manager = Arc::clone(self);

        let task = tokio::spawn(async move {
            let interval = manager.config.max_lifetime();
            tracing::info!(
                interval_seconds = interval.as_secs(),
                "Session gc task started"
            );

            loop {
                {
                    let _guard = manager.gate.lock().await;
                    manager.provider.gc(interval).await;
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = sleep(interval) => {}
                }
            }

            tracing::info!("Session gc task stopped");
        });

        GcHandle { shutdown_tx, task }
    }

    /// The session identifier carried by the request's cookie, if any.
    ///
    /// Empty cookie values count as absent. The value is percent-unescaped;
    /// a value that fails to unescape is used verbatim.
    pub(crate) fn request_sid(&self, req: &HeaderMap) -> Option<String> {
        let value = self.cookie_value(req)?;
        if value.is_empty() {
            return None;
        }
        Some(
            urlencoding::decode(&value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or(value),
        )
    }

    fn cookie_value(&self, req: &HeaderMap) -> Option<String> {
        for header in req.get_all(header::COOKIE) {
            let Ok(raw) = header.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse(raw.to_owned()) {
                let Ok(cookie) = cookie else {
                    continue;
                };
                if cookie.name() == self.config.cookie_name {
                    return Some(cookie.value().to_string());
                }
            }
        }
        None
    }

    fn issue_cookie(&self, res: &mut HeaderMap, sid: &str) {
        let max_age = self.config.max_lifetime_seconds as i64;
        // Max-Age and Expires are both set; some older clients only honor
        // one of the two.
        let cookie = Cookie::build((
            self.config.cookie_name.clone(),
            urlencoding::encode(sid).into_owned(),
        ))
        .path("/")
        .http_only(true)
        .max_age(CookieDuration::seconds(max_age))
        .expires(OffsetDateTime::now_utc() + CookieDuration::seconds(max_age))
        .build();

        append_set_cookie(res, &cookie);
    }

    pub(crate) async fn guard(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    pub(crate) fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub(crate) fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub(crate) fn config(&self) -> &ManagerConfig {
        &self.config
    }
}

/// Handle to the recurring gc task. Keep it alive for as long as the task
/// should run: dropping it closes the shutdown channel and the task stops
/// after its next sweep.
pub struct GcHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl GcHandle {
    /// Stop the gc task and wait for it to finish its current sweep.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

fn append_set_cookie(res: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            res.append(header::SET_COOKIE, value);
        }
        Err(error) => tracing::error!(%error, "Failed to encode Set-Cookie header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::InMemoryRecordStore;

    fn test_manager() -> SessionManager {
        let registry = ProviderRegistry::with_defaults();
        SessionManager::new(
            &registry,
            ManagerConfig::default(),
            Arc::new(InMemoryRecordStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let registry = ProviderRegistry::new();
        let result = SessionManager::new(
            &registry,
            ManagerConfig::default(),
            Arc::new(InMemoryRecordStore::new()),
        );
        match result {
            Ok(_) => panic!("construction should fail without a registered backend"),
            Err(err) => {
                assert!(matches!(err, LocksideError::UnknownProvider(name) if name == "memory"));
            }
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let manager = test_manager();
        let a = manager.generate_id().unwrap();
        let b = manager.generate_id().unwrap();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_generated_ids_are_cookie_safe() {
        let manager = test_manager();
        let sid = manager.generate_id().unwrap();

        // URL-safe base64 without padding: nothing needs escaping.
        assert!(sid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(urlencoding::encode(&sid), sid);
    }

    #[test]
    fn test_request_sid_parses_cookie_header() {
        let manager = test_manager();

        let mut req = HeaderMap::new();
        req.insert(
            header::COOKIE,
            HeaderValue::from_static("other=1; lockside_session=abc%2Fdef; trailing=2"),
        );

        assert_eq!(manager.request_sid(&req), Some("abc/def".to_string()));
    }

    #[test]
    fn test_request_sid_absent_or_empty() {
        let manager = test_manager();

        let req = HeaderMap::new();
        assert_eq!(manager.request_sid(&req), None);

        let mut req = HeaderMap::new();
        req.insert(
            header::COOKIE,
            HeaderValue::from_static("lockside_session="),
        );
        assert_eq!(manager.request_sid(&req), None);
    }
}
