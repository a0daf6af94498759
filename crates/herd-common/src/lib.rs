//! Common building blocks for herd: convergence polling, retries, errors and logging

#![deny(missing_docs)]

pub mod error;
pub mod retry;
pub mod telemetry;
pub mod wait;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Lifecycle State Labels
// =============================================================================
// States reported by the management API for managed resources. The poller
// treats them as opaque strings; these are the ones the provider relies on.

/// Resource is provisioned and serving
pub const STATE_ACTIVE: &str = "active";

/// Resource deletion has been accepted but is not finished
pub const STATE_REMOVING: &str = "removing";

/// Resource is gone. Also reported by the poller when a probe sees not-found
/// while waiting for removal.
pub const STATE_REMOVED: &str = "removed";

/// Resource entered a terminal error state on the remote side
pub const STATE_ERROR: &str = "error";
