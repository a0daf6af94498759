//! Management API access and resource lifecycle checks for herd
//!
//! - [`client`] - `ResourceClient` trait plus HTTP and in-memory implementations
//! - [`catalog`] - The catalog resource (a named, versioned collection of app templates)
//! - [`checks`] - Existence, destroy and out-of-band deletion checks
//! - [`config`] - Provider configuration (API endpoint, credentials, wait timing)

#![deny(missing_docs)]

pub mod catalog;
pub mod checks;
pub mod client;
pub mod config;

pub use catalog::{Catalog, CatalogSpec};
pub use client::{ApiError, ApiObject, ResourceClient};
pub use config::ProviderConfig;
pub use herd_common::{Error, Result};
