//! ABOUTME: Error taxonomy shared across the repository, REM, ingest, and dreaming crates
//! ABOUTME: Kinds (not types): Validation, NotFound, Conflict, Transient, Dependency, Internal

use thiserror::Error;

/// Convenience `Result` alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, P8fsError>;

/// Error taxonomy for the P8FS core (spec §7).
///
/// Each variant maps to exactly one of the six kinds named in the
/// specification; callers should match on kind via [`P8fsError::retryable`]
/// and [`P8fsError::user_visible`] rather than on the variant itself where
/// possible, since new leaf variants may be added within a kind.
#[derive(Debug, Error)]
pub enum P8fsError {
    /// Malformed REM query, malformed event path, bad parameter. Permanent.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Entity id or KV key missing. Not an error to most callers.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// Tenant mismatch on upsert, deterministic-id collision with different content.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Pool checkout timeout, network reset, backend overload. Retry with backoff.
    #[error("transient error: {message}")]
    Transient { message: String },

    /// Missing embedding provider or LLM credentials.
    #[error("dependency unavailable: {message}")]
    Dependency { message: String },

    /// Unexpected parse or invariant violation. Logged with full context, never retried.
    #[error("internal error: {message}")]
    Internal { message: String },

    /// A JSON (de)serialization failure, always a caller bug or a corrupt row.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O failure from the durable KV table or a file-backed store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl P8fsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict { message: message.into() }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient { message: message.into() }
    }

    pub fn dependency(message: impl Into<String>) -> Self {
        Self::Dependency { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether the generic retry wrapper (§4.D "Failure semantics") should
    /// re-attempt the operation with exponential backoff.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether this error kind is one of the four the spec says the
    /// user-visible surface should ever see (§7 "Propagation policy").
    #[must_use]
    pub const fn user_visible(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::NotFound { .. } | Self::Dependency { .. } | Self::Internal { .. }
        )
    }
}
