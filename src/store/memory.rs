use crate::error::Result;
use crate::traits::{Provider, Session, SessionHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;

/// In-memory session backend
///
/// Stores sessions in a HashMap. Suitable for a single-process admin surface;
/// sessions are lost on restart and not shared across instances.
#[derive(Default)]
pub struct MemoryProvider {
    sessions: RwLock<HashMap<String, Arc<MemorySession>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions, for tests and diagnostics.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn init(&self, sid: &str) -> Result<SessionHandle> {
        let session = Arc::new(MemorySession::new(sid));
        self.sessions
            .write()
            .await
            .insert(sid.to_string(), session.clone());
        Ok(session)
    }

    async fn read(&self, sid: &str) -> Result<SessionHandle> {
        if let Some(session) = self.sessions.read().await.get(sid) {
            session.touch().await;
            return Ok(session.clone());
        }
        // Read miss creates an empty session under the requested identifier.
        self.init(sid).await
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        self.sessions.write().await.remove(sid);
        Ok(())
    }

    async fn gc(&self, max_lifetime: Duration) {
        let mut sessions = self.sessions.write().await;
        let initial_len = sessions.len();

        let mut stale = Vec::new();
        for (sid, session) in sessions.iter() {
            if session.idle().await >= max_lifetime {
                stale.push(sid.clone());
            }
        }
        for sid in stale {
            sessions.remove(&sid);
        }

        let removed = initial_len - sessions.len();
        if removed > 0 {
            tracing::debug!(removed, "Evicted stale in-memory sessions");
        }
    }
}

/// A session held by [`MemoryProvider`].
pub struct MemorySession {
    id: String,
    last_accessed: RwLock<SystemTime>,
    data: RwLock<HashMap<String, String>>,
}

impl MemorySession {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            last_accessed: RwLock::new(SystemTime::now()),
            data: RwLock::new(HashMap::new()),
        }
    }

    async fn touch(&self) {
        *self.last_accessed.write().await = SystemTime::now();
    }

    async fn idle(&self) -> Duration {
        self.last_accessed
            .read()
            .await
            .elapsed()
            .unwrap_or(Duration::ZERO)
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.touch().await;
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.touch().await;
        self.data.read().await.get(key).cloned()
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.touch().await;
        self.data.write().await.remove(key);
        Ok(())
    }

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_and_read() {
        let provider = MemoryProvider::new();

        let session = provider.init("sid-1").await.unwrap();
        session.set("user", "alice").await.unwrap();

        let again = provider.read("sid-1").await.unwrap();
        assert_eq!(again.get("user").await, Some("alice".to_string()));
        assert_eq!(again.id(), "sid-1");
    }

    #[tokio::test]
    async fn test_read_miss_creates() {
        let provider = MemoryProvider::new();

        let session = provider.read("never-seen").await.unwrap();
        assert_eq!(session.id(), "never-seen");
        assert_eq!(session.get("anything").await, None);
        assert_eq!(provider.len().await, 1);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let provider = MemoryProvider::new();

        provider.init("sid-1").await.unwrap();
        provider.destroy("sid-1").await.unwrap();
        provider.destroy("sid-1").await.unwrap();
        provider.destroy("never-existed").await.unwrap();

        assert!(provider.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let provider = MemoryProvider::new();
        let session = provider.init("sid-1").await.unwrap();

        session.set("k", "v1").await.unwrap();
        session.set("k", "v2").await.unwrap();
        assert_eq!(session.get("k").await, Some("v2".to_string()));

        session.remove("k").await.unwrap();
        assert_eq!(session.get("k").await, None);

        // Removing an absent key is fine.
        session.remove("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_gc_evicts_stale_sessions() {
        let provider = MemoryProvider::new();

        provider.init("stale").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let fresh = provider.init("fresh").await.unwrap();
        fresh.set("k", "v").await.unwrap();

        provider.gc(Duration::from_millis(25)).await;

        assert_eq!(provider.len().await, 1);
        let survivor = provider.read("fresh").await.unwrap();
        assert_eq!(survivor.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_gc_twice_evicts_nothing_more() {
        let provider = MemoryProvider::new();

        provider.init("stale").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        provider.gc(Duration::from_millis(25)).await;
        let after_first = provider.len().await;

        provider.gc(Duration::from_millis(25)).await;
        assert_eq!(provider.len().await, after_first);
    }
}
