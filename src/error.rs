//! Error types for the lobby session client
//!
//! This module defines all error types using anyhow for consistent error
//! handling throughout the crate.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Typed failures reported by the remote lobby directory
///
/// Every directory call either succeeds or fails with exactly one of these
/// kinds; the coordinator surfaces them to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("lobby is full: {message}")]
    Full { message: String },

    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("no available lobby: {message}")]
    NoAvailableLobby { message: String },

    #[error("rate limited: {message}")]
    RateLimited { message: String },

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("directory error: {message}")]
    Unknown { message: String },
}

/// Local session errors raised before any directory call is issued
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no lobby is currently joined")]
    NotJoined,

    #[error("no lobby is currently hosted")]
    NotHosting,

    #[error("lobby state lock poisoned")]
    StatePoisoned,
}
