//! # Errors
//!
//! Everything the decision core can report to its host. Precondition
//! violations mean the session is broken (clock/ordering fault or a bad
//! manifest) and should be aborted; configuration errors are raised at
//! construction before any event is processed.
//!
//! Numeric degeneracies (empty history, zero denominators) are never
//! surfaced here: they are guarded where they occur and fall back to the
//! lowest quality level.

use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AbrError {
    // ─── Precondition violations ───
    #[error("response received with no outstanding request")]
    NoRequestInFlight,
    #[error("elapsed time must be positive, measured {elapsed_secs}s")]
    NonPositiveElapsed { elapsed_secs: f64 },
    #[error("no quality levels available: manifest not loaded")]
    ManifestNotLoaded,
    #[error("invalid quality levels: {0}")]
    InvalidQualityLevels(String),
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
    #[error("session already shut down")]
    SessionClosed,

    // ─── Configuration ───
    #[error("invalid retention policy {0:?}")]
    InvalidRetention(String),
    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("buffer_min must be positive, got {0}")]
    InvalidBufferMin(f64),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Broad classification a host uses to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Clock/ordering fault or unusable manifest. Abort the session.
    PreconditionViolation,
    /// Rejected at construction time.
    Configuration,
}

impl AbrError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AbrError::NoRequestInFlight
            | AbrError::NonPositiveElapsed { .. }
            | AbrError::ManifestNotLoaded
            | AbrError::InvalidQualityLevels(_)
            | AbrError::InvalidManifest(_)
            | AbrError::SessionClosed => ErrorKind::PreconditionViolation,
            AbrError::InvalidRetention(_)
            | AbrError::InvalidParameter { .. }
            | AbrError::InvalidBufferMin(_)
            | AbrError::InvalidConfig(_) => ErrorKind::Configuration,
        }
    }
}

pub type Result<T, E = AbrError> = std::result::Result<T, E>;
