//! Session storage backends.
//!
//! Ships an in-memory backend for development and single-process use, and a
//! file-backed backend that survives restarts. Both implement the
//! [`Provider`](crate::traits::Provider) trait.

mod file;
mod memory;

pub use file::FileProvider;
pub use memory::MemoryProvider;
