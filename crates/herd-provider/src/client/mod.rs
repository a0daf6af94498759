//! Resource clients for the management API
//!
//! [`ResourceClient`] is the seam the lifecycle checks are written against.
//! Two implementations exist:
//! - [`http::HttpCollection`] talks to a real management API over REST
//! - [`memory::MemoryCollection`] is backed by an in-process store that
//!   finishes deletions asynchronously, like the real server does

pub mod http;
pub mod memory;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use herd_common::Error;

#[cfg(test)]
use crate::catalog::{Catalog, CatalogSpec};

/// Errors returned by the management API
#[derive(Debug, Error)]
pub enum ApiError {
    /// The resource does not exist
    #[error("{kind} ({id}) not found")]
    NotFound {
        /// Resource kind
        kind: String,
        /// Resource identifier
        id: String,
    },

    /// The server answered with a non-success status
    #[error("api returned {code}: {message}")]
    Status {
        /// HTTP status code
        code: u16,
        /// Response body or reason
        message: String,
    },

    /// The request never got a response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not match the expected schema
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Create a not-found error
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create a status error
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Whether the resource was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Whether repeating the request may succeed
    ///
    /// Server errors, throttling, request timeouts and transport failures are
    /// transient. Client errors and schema mismatches are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::NotFound { .. } => false,
            ApiError::Status { code, .. } => *code >= 500 || *code == 408 || *code == 429,
            ApiError::Transport(_) => true,
            ApiError::Decode(_) => false,
        }
    }

    /// Status error for a spec that failed validation
    pub fn invalid(source: Error) -> Self {
        Self::status(422, source.to_string())
    }

    /// Convert into the crate error, attaching resource context
    pub fn for_resource(self, kind: &str, id: &str) -> Error {
        match &self {
            ApiError::NotFound { .. } => Error::not_found(kind, id),
            _ if self.is_retryable() => Error::api(kind, id, self.to_string()),
            _ => Error::api_permanent(kind, id, self.to_string()),
        }
    }
}

/// A resource type exposed by the management API as a REST collection
///
/// The `from_spec` / `apply_spec` / `set_state` hooks let the in-memory API
/// play the server's part for any resource type.
pub trait ApiObject: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Singular kind used in messages (e.g., "catalog")
    const KIND: &'static str;
    /// Collection path segment (e.g., "catalogs")
    const COLLECTION: &'static str;

    /// Desired-state input for create and update
    type Spec: Clone + Send + Sync + Serialize + 'static;

    /// Server-assigned identifier
    fn id(&self) -> &str;

    /// Current lifecycle state
    fn state(&self) -> &str;

    /// Reject a spec the server would refuse
    fn validate_spec(_spec: &Self::Spec) -> herd_common::Result<()> {
        Ok(())
    }

    /// Build a freshly created object from a spec
    fn from_spec(id: String, spec: &Self::Spec) -> Self;

    /// Apply an update
    fn apply_spec(&mut self, spec: &Self::Spec);

    /// Overwrite the lifecycle state
    fn set_state(&mut self, state: &str);
}

/// CRUD access to one collection of the management API
///
/// Every method distinguishes "not found" ([`ApiError::NotFound`]) from other
/// failures so callers can decide whether absence is success or failure.
#[cfg_attr(test, automock(type Resource = Catalog; type Spec = CatalogSpec;))]
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// The resource type served by this collection
    type Resource: ApiObject<Spec = Self::Spec>;

    /// Desired-state input for create and update
    type Spec: Clone + Send + Sync + Serialize + 'static;

    /// Look up a resource by identifier
    async fn by_id(&self, id: &str) -> Result<Self::Resource, ApiError>;

    /// Create a resource
    async fn create(&self, spec: &Self::Spec) -> Result<Self::Resource, ApiError>;

    /// Replace the desired state of an existing resource
    async fn update(&self, id: &str, spec: &Self::Spec) -> Result<Self::Resource, ApiError>;

    /// Request deletion. The server may finish asynchronously.
    async fn delete(&self, resource: &Self::Resource) -> Result<(), ApiError>;
}
