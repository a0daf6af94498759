//! REST client for the management API
//!
//! Resources live under `{api_url}/v3/{collection}/{id}` and are addressed
//! with a bearer token.

use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use herd_common::{Error, Result};

use super::{ApiError, ApiObject, ResourceClient};
use crate::catalog::Catalog;
use crate::config::ProviderConfig;

const API_VERSION_PATH: &str = "v3";

/// Connection to a management API endpoint
#[derive(Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagementClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ManagementClient {
    /// Build a client from validated provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: normalize_base_url(config.api_url()?),
            token: config.token.clone(),
        })
    }

    /// Typed access to one collection
    pub fn collection<R: ApiObject>(&self) -> HttpCollection<R> {
        HttpCollection {
            client: self.clone(),
            _resource: PhantomData,
        }
    }

    /// Catalog collection
    pub fn catalogs(&self) -> HttpCollection<Catalog> {
        self.collection()
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn resource_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Strip trailing slashes and any version suffix, then append `/v3`
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix(&format!("/{}", API_VERSION_PATH))
        .unwrap_or(trimmed);
    format!("{}/{}", trimmed, API_VERSION_PATH)
}

/// One REST collection of the management API
pub struct HttpCollection<R> {
    client: ManagementClient,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for HttpCollection<R> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: ApiObject> HttpCollection<R> {
    /// Send a request; a 404 means "not found" only when `id` names a resource
    async fn send(
        &self,
        request: RequestBuilder,
        id: Option<&str>,
    ) -> std::result::Result<Response, ApiError> {
        let response = self.client.authorize(request).send().await?;
        let status = response.status();
        if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
            return Err(ApiError::not_found(R::KIND, id));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body
            };
            return Err(ApiError::status(status.as_u16(), message));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> std::result::Result<T, ApiError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl<R: ApiObject> ResourceClient for HttpCollection<R> {
    type Resource = R;
    type Spec = R::Spec;

    async fn by_id(&self, id: &str) -> std::result::Result<R, ApiError> {
        let url = self.client.resource_url(R::COLLECTION, id);
        debug!(kind = R::KIND, id = %id, "GET {}", url);
        let response = self.send(self.client.http.get(&url), Some(id)).await?;
        Self::decode(response).await
    }

    async fn create(&self, spec: &R::Spec) -> std::result::Result<R, ApiError> {
        R::validate_spec(spec).map_err(ApiError::invalid)?;
        let url = self.client.collection_url(R::COLLECTION);
        debug!(kind = R::KIND, "POST {}", url);
        let response = self.send(self.client.http.post(&url).json(spec), None).await?;
        Self::decode(response).await
    }

    async fn update(&self, id: &str, spec: &R::Spec) -> std::result::Result<R, ApiError> {
        R::validate_spec(spec).map_err(ApiError::invalid)?;
        let url = self.client.resource_url(R::COLLECTION, id);
        debug!(kind = R::KIND, id = %id, "PUT {}", url);
        let response = self
            .send(self.client.http.put(&url).json(spec), Some(id))
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, resource: &R) -> std::result::Result<(), ApiError> {
        let id = resource.id();
        let url = self.client.resource_url(R::COLLECTION, id);
        debug!(kind = R::KIND, id = %id, "DELETE {}", url);
        self.send(self.client.http.delete(&url), Some(id)).await?;
        Ok(())
    }
}
