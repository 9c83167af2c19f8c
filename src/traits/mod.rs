//! Capability traits for pluggable session storage.

pub mod provider;

pub use provider::{Provider, Session, SessionHandle};
