use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// The main error type for lockside operations
#[derive(Debug, thiserror::Error)]
pub enum LocksideError {
    #[error("unknown session provider {0:?}")]
    UnknownProvider(String),

    #[error("session provider {0:?} is already registered")]
    DuplicateProvider(String),

    #[error("failed to generate session identifier: {0}")]
    IdentifierGeneration(String),

    #[error("session storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LocksideError {
    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Self::UnknownProvider(name.into())
    }

    pub fn duplicate_provider(name: impl Into<String>) -> Self {
        Self::DuplicateProvider(name.into())
    }

    pub fn identifier_generation(msg: impl Into<String>) -> Self {
        Self::IdentifierGeneration(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// Returns a safe message suitable for client responses.
    ///
    /// Session storage internals are never exposed to clients; the full error
    /// is logged server-side.
    fn safe_message(&self) -> &'static str {
        "session error"
    }
}

impl IntoResponse for LocksideError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        tracing::error!(
            status = status.as_u16(),
            error = %self,
            "Session operation failed"
        );

        (status, self.safe_message()).into_response()
    }
}

/// Result type alias for lockside operations
pub type Result<T> = std::result::Result<T, LocksideError>;
