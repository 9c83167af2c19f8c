use crate::error::{LocksideError, Result};
use crate::traits::{Provider, Session, SessionHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// File-backed session backend
///
/// Persists each session as a JSON file named after its identifier inside a
/// root directory, so sessions survive process restarts. Inactivity is
/// tracked through file modification times; every read and write refreshes
/// the file on disk.
pub struct FileProvider {
    root: PathBuf,
}

impl FileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the on-disk path for `sid`, rejecting identifiers that could
    /// escape the root directory. Identifiers issued by the manager are
    /// URL-safe base64, but cookie values come from the client.
    fn session_path(&self, sid: &str) -> Result<PathBuf> {
        if sid.is_empty()
            || sid == "."
            || sid == ".."
            || sid.contains('/')
            || sid.contains('\\')
        {
            return Err(LocksideError::storage(format!(
                "invalid session identifier {sid:?}"
            )));
        }
        Ok(self.root.join(sid))
    }

    async fn persist(path: &Path, data: &HashMap<String, String>) -> Result<()> {
        let bytes = serde_json::to_vec(data)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl Provider for FileProvider {
    async fn init(&self, sid: &str) -> Result<SessionHandle> {
        let path = self.session_path(sid)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let data = HashMap::new();
        Self::persist(&path, &data).await?;

        Ok(Arc::new(FileSession {
            id: sid.to_string(),
            path,
            data: RwLock::new(data),
        }))
    }

    async fn read(&self, sid: &str) -> Result<SessionHandle> {
        let path = self.session_path(sid)?;

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(data) => data,
                Err(error) => {
                    tracing::warn!(sid, %error, "Corrupt session file, recreating empty");
                    HashMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                // Read miss creates, same contract as the in-memory backend.
                return self.init(sid).await;
            }
            Err(error) => return Err(error.into()),
        };

        // Rewriting refreshes the modification time, which is what gc
        // measures inactivity against.
        Self::persist(&path, &data).await?;

        Ok(Arc::new(FileSession {
            id: sid.to_string(),
            path,
            data: RwLock::new(data),
        }))
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        let path = self.session_path(sid)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    async fn gc(&self, max_lifetime: Duration) {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return,
            Err(error) => {
                tracing::warn!(%error, "Failed to scan session directory for gc");
                return;
            }
        };

        let mut removed = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let stale = entry
                .metadata()
                .await
                .ok()
                .and_then(|meta| meta.modified().ok())
                .and_then(|modified| modified.elapsed().ok())
                .is_some_and(|idle| idle >= max_lifetime);

            if stale && tokio::fs::remove_file(entry.path()).await.is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::debug!(removed, "Evicted stale session files");
        }
    }
}

/// A session held by [`FileProvider`].
///
/// Writes are persisted synchronously, so a crash loses at most the write
/// in flight.
pub struct FileSession {
    id: String,
    path: PathBuf,
    data: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl Session for FileSession {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), value.to_string());
        FileProvider::persist(&self.path, &data).await
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.data.read().await.get(key).cloned()
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut data = self.data.write().await;
        data.remove(key);
        FileProvider::persist(&self.path, &data).await
    }

    fn id(&self) -> &str {
        &self.id
    }
}
