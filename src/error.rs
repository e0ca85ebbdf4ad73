//! Error types for a duplex voice session.
//!
//! Every variant maps to one failure class with a fixed policy:
//! - [`SessionError::Config`]: raised before any stream is opened
//! - [`SessionError::Establish`]: transport could not be set up (fallback-eligible)
//! - [`SessionError::Transport`] / [`SessionError::Device`]: fatal mid-session
//!
//! Malformed inbound payloads never surface here; they are dropped where they
//! are decoded.

use crate::transport::TransportKind;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Missing credentials, endpoint or identifiers.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport construction or handshake failed.
    #[error("{kind} transport could not be established: {reason}")]
    Establish {
        /// Which transport variant failed.
        kind: TransportKind,
        /// Underlying failure.
        reason: String,
    },

    /// The connection dropped or the keepalive expired.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Audio stream open, write, or runtime failure.
    #[error("audio device error: {0}")]
    Device(String),

    /// A session task panicked or was torn down unexpectedly.
    #[error("session task failed: {0}")]
    Task(String),
}

impl SessionError {
    /// Whether the SDK→raw fallback may be attempted after this error.
    pub fn is_establish(&self) -> bool {
        matches!(self, SessionError::Establish { .. })
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
