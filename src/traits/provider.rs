//! Session storage traits
//!
//! These traits abstract session storage, allowing the manager to swap
//! between in-memory, file-backed, or custom implementations.

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a live session.
pub type SessionHandle = Arc<dyn Session>;

/// A single session's key/value state.
///
/// Keys are unordered and writes are last-write-wins per key. A `get`
/// immediately following a `set` on the same handle observes the new value;
/// a backend may otherwise batch its persistence.
#[async_trait]
pub trait Session: Send + Sync {
    /// Store a value under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    /// Remove the value stored under `key`. Removing an absent key is not
    /// an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// The opaque identifier this session was created under.
    fn id(&self) -> &str;
}

/// Session storage backend.
///
/// Implementations register themselves with a [`ProviderRegistry`] under a
/// name and are selected by that name at manager construction.
///
/// [`ProviderRegistry`]: crate::ProviderRegistry
#[async_trait]
pub trait Provider: Send + Sync {
    /// Create and persist a new empty session under `sid`.
    ///
    /// Must succeed for any syntactically valid identifier; fails with a
    /// storage error if the backend cannot allocate or persist.
    async fn init(&self, sid: &str) -> Result<SessionHandle>;

    /// Fetch the session stored under `sid`.
    ///
    /// A read miss creates an empty session transparently rather than
    /// returning an error, so callers presenting a stale cookie keep
    /// working after the backend has evicted their state.
    async fn read(&self, sid: &str) -> Result<SessionHandle>;

    /// Remove the session stored under `sid` and free backend resources.
    ///
    /// Idempotent: destroying an unknown identifier is not an error.
    async fn destroy(&self, sid: &str) -> Result<()>;

    /// Evict sessions whose inactivity exceeds `max_lifetime`.
    ///
    /// Safe to invoke repeatedly, and concurrently with `init`/`read`/
    /// `destroy` on other identifiers.
    async fn gc(&self, max_lifetime: std::time::Duration);
}
