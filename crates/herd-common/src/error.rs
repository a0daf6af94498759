//! Error types for herd operations
//!
//! Errors are structured with fields to aid debugging. Every variant that
//! concerns a managed resource carries the resource kind and identifier so
//! callers never have to re-wrap them with that context.

use thiserror::Error;

use crate::wait::WaitError;

/// Main error type for herd operations
#[derive(Debug, Error)]
pub enum Error {
    /// The management API rejected or failed a request
    #[error("api error for {kind} ({id}): {message}")]
    Api {
        /// Resource kind (e.g., "catalog")
        kind: String,
        /// Resource identifier
        id: String,
        /// Description of what failed
        message: String,
        /// Whether repeating the request may succeed
        retryable: bool,
    },

    /// A resource expected to exist was not found
    #[error("{kind} ({id}) not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
    },

    /// A resource expected to be destroyed is still present
    #[error("{kind} ({id}) still exists")]
    StillExists {
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
    },

    /// Waiting for a resource to converge failed
    #[error("waiting for {kind} ({id}) to {action}: {source}")]
    Wait {
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
        /// What the wait expected, phrased as a verb ("be removed", "become active")
        action: String,
        /// The terminal condition reported by the poller
        #[source]
        source: WaitError,
    },

    /// Invalid input from a caller
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The offending field, if known
        field: Option<String>,
    },

    /// Missing or malformed configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's wrong
        message: String,
    },
}

impl Error {
    /// Create a retryable API error for a resource
    pub fn api(kind: impl Into<String>, id: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Api {
            kind: kind.into(),
            id: id.into(),
            message: msg.into(),
            retryable: true,
        }
    }

    /// Create a non-retryable API error (e.g., permission denied, bad request)
    pub fn api_permanent(
        kind: impl Into<String>,
        id: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Api {
            kind: kind.into(),
            id: id.into(),
            message: msg.into(),
            retryable: false,
        }
    }

    /// Create a not-found error for a resource
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create a still-exists error for a resource
    pub fn still_exists(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::StillExists {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Wrap a poller failure with the resource and the awaited action
    pub fn wait(
        kind: impl Into<String>,
        id: impl Into<String>,
        action: impl Into<String>,
        source: WaitError,
    ) -> Self {
        Self::Wait {
            kind: kind.into(),
            id: id.into(),
            action: action.into(),
            source,
        }
    }

    /// Create a validation error naming the offending field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Only API errors flagged retryable and poller timeouts qualify.
    /// Everything else needs a change on the caller's side first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { retryable, .. } => *retryable,
            Error::Wait { source, .. } => matches!(source, WaitError::Timeout { .. }),
            Error::NotFound { .. } => false,
            Error::StillExists { .. } => false,
            Error::Validation { .. } => false,
            Error::Config { .. } => false,
        }
    }

    /// Whether this error reports a missing resource
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Get the (kind, id) pair if this error concerns a specific resource
    pub fn resource(&self) -> Option<(&str, &str)> {
        match self {
            Error::Api { kind, id, .. }
            | Error::NotFound { kind, id }
            | Error::StillExists { kind, id }
            | Error::Wait { kind, id, .. } => Some((kind, id)),
            Error::Validation { .. } | Error::Config { .. } => None,
        }
    }
}
