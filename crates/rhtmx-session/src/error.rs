// File: src/error.rs
// Purpose: Error types for sessions and their transports

use rhtmx_router::NavigationError;

/// Failure of the underlying message channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Errors surfaced by session creation and the session loop
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Route resolution failed (guard abort, redirect loop, bad redirect)
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("session is closed")]
    Closed,
}
