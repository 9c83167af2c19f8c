//! Lockside - cookie-backed sessions with a persisted write-lock layer
//!
//! Lockside is a small session-management layer for a single-service admin
//! or control web surface. It issues and validates opaque session
//! identifiers via cookies, stores small key/value session state behind a
//! pluggable storage backend, garbage-collects stale sessions on a
//! recurring background task, and layers a mutual-exclusion "lock" flag on
//! top of sessions that is persisted independently of the session store and
//! reconciled across restarts.
//!
//! # Features
//!
//! - **Pluggable storage**: in-memory and file-backed session backends
//!   behind the [`Provider`] trait, selected by name through a
//!   [`ProviderRegistry`]
//! - **Cookie contract**: Path=/, HttpOnly, Max-Age and Expires both set;
//!   destroy overwrites with an immediately-expiring cookie
//! - **Background gc**: a cancellable tokio task sweeping once per
//!   max-lifetime interval
//! - **Write-lock layer**: [`LockCoordinator`] gates concurrent writers,
//!   with lock state mirrored into a durable [`RecordStore`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lockside::{
//!     InMemoryRecordStore, LockCoordinator, ManagerConfig, ProviderRegistry, SessionManager,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> lockside::Result<()> {
//!     lockside::init_tracing();
//!
//!     let registry = ProviderRegistry::with_defaults();
//!     let records = Arc::new(InMemoryRecordStore::new());
//!
//!     let manager = Arc::new(SessionManager::new(
//!         &registry,
//!         ManagerConfig::from_env(),
//!         records,
//!     )?);
//!
//!     // Reconcile durable lock state, then start the gc loop.
//!     manager.initialize().await?;
//!     let gc = manager.spawn_gc();
//!
//!     let locks = LockCoordinator::new(manager.clone());
//!     // ... wire `manager` and `locks` into your HTTP handlers ...
//!
//!     gc.shutdown().await;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
pub mod lock;
pub mod manager;
pub mod record;
mod registry;
pub mod store;
pub mod traits;
mod utils;

// Re-exports for public API
pub use config::ManagerConfig;
pub use error::{LocksideError, Result};
pub use lock::{LockCoordinator, LOCK_KEY};
pub use manager::{GcHandle, SessionManager};
pub use record::{InMemoryRecordStore, JsonFileRecordStore, RecordStore, SessionRecord};
pub use registry::ProviderRegistry;
pub use store::{FileProvider, MemoryProvider};
pub use traits::{Provider, Session, SessionHandle};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults
///
/// This should be called early in your application, typically in main().
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "lockside=debug")
/// - `LOCKSIDE_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("LOCKSIDE_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
