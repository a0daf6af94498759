//! In-process management API
//!
//! Stores objects as JSON keyed by collection and id. Deletions are finished
//! asynchronously: a deleted object reports `removing` for a configurable
//! number of reads before it disappears, like the real server does.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use herd_common::STATE_REMOVING;

use super::{ApiError, ApiObject, ResourceClient};
use crate::catalog::Catalog;

/// Reads a deleted object survives before it is gone
pub const DEFAULT_REMOVAL_LAG: u32 = 2;

struct Entry {
    object: Value,
    /// Remaining reads before a pending removal completes
    removal: Option<u32>,
}

#[derive(Default)]
struct Store {
    entries: HashMap<(String, String), Entry>,
    removal_lag: u32,
    /// Status codes returned by the next delete calls, in order
    delete_faults: Vec<u16>,
}

/// Shared in-memory API; clones see the same store
#[derive(Clone)]
pub struct InMemoryApi {
    store: Arc<Mutex<Store>>,
}

impl Default for InMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryApi {
    /// Empty API with the default removal lag
    pub fn new() -> Self {
        Self::with_removal_lag(DEFAULT_REMOVAL_LAG)
    }

    /// Empty API whose deletions take `reads` lookups to complete
    pub fn with_removal_lag(reads: u32) -> Self {
        Self {
            store: Arc::new(Mutex::new(Store {
                removal_lag: reads,
                ..Default::default()
            })),
        }
    }

    /// Typed access to one collection
    pub fn collection<R: ApiObject>(&self) -> MemoryCollection<R> {
        MemoryCollection {
            api: self.clone(),
            _resource: PhantomData,
        }
    }

    /// Catalog collection
    pub fn catalogs(&self) -> MemoryCollection<Catalog> {
        self.collection()
    }

    /// Fail the next delete calls with these status codes
    pub fn fail_deletes(&self, codes: impl IntoIterator<Item = u16>) {
        self.store.lock().delete_faults.extend(codes);
    }

    /// Force the lifecycle state of a stored object
    pub fn inject_state<R: ApiObject>(&self, id: &str, state: &str) -> Result<(), ApiError> {
        let mut store = self.store.lock();
        let entry = store
            .entries
            .get_mut(&key::<R>(id))
            .ok_or_else(|| ApiError::not_found(R::KIND, id))?;
        let mut object: R = decode(&entry.object)?;
        object.set_state(state);
        entry.object = encode(&object)?;
        Ok(())
    }

    /// Whether an object is stored, including one being removed
    pub fn contains<R: ApiObject>(&self, id: &str) -> bool {
        self.store.lock().entries.contains_key(&key::<R>(id))
    }

    /// Number of stored objects in a collection
    pub fn count<R: ApiObject>(&self) -> usize {
        self.store
            .lock()
            .entries
            .keys()
            .filter(|(collection, _)| collection == R::COLLECTION)
            .count()
    }
}

fn key<R: ApiObject>(id: &str) -> (String, String) {
    (R::COLLECTION.to_string(), id.to_string())
}

fn encode<R: ApiObject>(object: &R) -> Result<Value, ApiError> {
    serde_json::to_value(object).map_err(|e| ApiError::Decode(e.to_string()))
}

fn decode<R: ApiObject>(value: &Value) -> Result<R, ApiError> {
    serde_json::from_value(value.clone()).map_err(|e| ApiError::Decode(e.to_string()))
}

/// One collection of an [`InMemoryApi`]
pub struct MemoryCollection<R> {
    api: InMemoryApi,
    _resource: PhantomData<fn() -> R>,
}

impl<R> Clone for MemoryCollection<R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            _resource: PhantomData,
        }
    }
}

#[async_trait]
impl<R: ApiObject> ResourceClient for MemoryCollection<R> {
    type Resource = R;
    type Spec = R::Spec;

    async fn by_id(&self, id: &str) -> Result<R, ApiError> {
        let mut store = self.api.store.lock();
        let key = key::<R>(id);
        let entry = store
            .entries
            .get_mut(&key)
            .ok_or_else(|| ApiError::not_found(R::KIND, id))?;

        let removal = entry.removal;
        match removal {
            Some(0) => {
                store.entries.remove(&key);
                debug!(kind = R::KIND, id = %id, "Removal finished");
                Err(ApiError::not_found(R::KIND, id))
            }
            Some(remaining) => {
                entry.removal = Some(remaining - 1);
                decode(&entry.object)
            }
            None => decode(&entry.object),
        }
    }

    async fn create(&self, spec: &R::Spec) -> Result<R, ApiError> {
        R::validate_spec(spec).map_err(ApiError::invalid)?;
        let id = format!("{}-{}", R::KIND, uuid::Uuid::new_v4().simple());
        let object = R::from_spec(id.clone(), spec);
        let value = encode(&object)?;
        self.api.store.lock().entries.insert(
            key::<R>(&id),
            Entry {
                object: value,
                removal: None,
            },
        );
        debug!(kind = R::KIND, id = %id, "Created");
        Ok(object)
    }

    async fn update(&self, id: &str, spec: &R::Spec) -> Result<R, ApiError> {
        R::validate_spec(spec).map_err(ApiError::invalid)?;
        let mut store = self.api.store.lock();
        let entry = store
            .entries
            .get_mut(&key::<R>(id))
            .filter(|e| e.removal.is_none())
            .ok_or_else(|| ApiError::not_found(R::KIND, id))?;
        let mut object: R = decode(&entry.object)?;
        object.apply_spec(spec);
        entry.object = encode(&object)?;
        Ok(object)
    }

    async fn delete(&self, resource: &R) -> Result<(), ApiError> {
        let id = resource.id();
        let mut store = self.api.store.lock();
        if !store.delete_faults.is_empty() {
            let code = store.delete_faults.remove(0);
            return Err(ApiError::status(code, "injected failure"));
        }

        let lag = store.removal_lag;
        let entry = store
            .entries
            .get_mut(&key::<R>(id))
            .ok_or_else(|| ApiError::not_found(R::KIND, id))?;
        if entry.removal.is_none() {
            let mut object: R = decode(&entry.object)?;
            object.set_state(STATE_REMOVING);
            entry.object = encode(&object)?;
            entry.removal = Some(lag);
        }
        debug!(kind = R::KIND, id = %id, lag, "Removal requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSpec;
    use herd_common::STATE_ACTIVE;

    fn spec() -> CatalogSpec {
        CatalogSpec::new("foo", "http://foo.com:8080")
    }

    #[tokio::test]
    async fn created_objects_are_readable() {
        let api = InMemoryApi::new();
        let catalogs = api.catalogs();

        let created = catalogs.create(&spec()).await.unwrap();
        assert!(created.id.starts_with("catalog-"));

        let fetched = catalogs.by_id(&created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.state, STATE_ACTIVE);
        assert_eq!(api.count::<Catalog>(), 1);
    }

    #[tokio::test]
    async fn deletion_completes_after_lag() {
        let api = InMemoryApi::with_removal_lag(2);
        let catalogs = api.catalogs();
        let created = catalogs.create(&spec()).await.unwrap();

        catalogs.delete(&created).await.unwrap();

        for _ in 0..2 {
            let seen = catalogs.by_id(&created.id).await.unwrap();
            assert_eq!(seen.state, STATE_REMOVING);
        }
        assert!(catalogs.by_id(&created.id).await.unwrap_err().is_not_found());
        assert!(!api.contains::<Catalog>(&created.id));
    }

    #[tokio::test]
    async fn zero_lag_removes_on_next_read() {
        let api = InMemoryApi::with_removal_lag(0);
        let catalogs = api.catalogs();
        let created = catalogs.create(&spec()).await.unwrap();

        catalogs.delete(&created).await.unwrap();
        assert!(api.contains::<Catalog>(&created.id));
        assert!(catalogs.by_id(&created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn repeated_delete_does_not_restart_removal() {
        let api = InMemoryApi::with_removal_lag(1);
        let catalogs = api.catalogs();
        let created = catalogs.create(&spec()).await.unwrap();

        catalogs.delete(&created).await.unwrap();
        catalogs.by_id(&created.id).await.unwrap();
        catalogs.delete(&created).await.unwrap();

        assert!(catalogs.by_id(&created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn updates_are_refused_while_removing() {
        let api = InMemoryApi::new();
        let catalogs = api.catalogs();
        let created = catalogs.create(&spec()).await.unwrap();
        catalogs.delete(&created).await.unwrap();

        let err = catalogs.update(&created.id, &spec()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn invalid_specs_are_refused() {
        let api = InMemoryApi::new();
        let catalogs = api.catalogs();

        let err = catalogs
            .create(&CatalogSpec::new("", "http://foo.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { code: 422, .. }));
        assert_eq!(api.count::<Catalog>(), 0);

        let created = catalogs.create(&spec()).await.unwrap();
        let err = catalogs
            .update(&created.id, &CatalogSpec::new("foo", "ftp://foo.com"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("must be http(s)"));
        assert_eq!(catalogs.by_id(&created.id).await.unwrap().url, spec().url);
    }

    #[tokio::test]
    async fn injected_delete_faults_are_consumed_in_order() {
        let api = InMemoryApi::new();
        let catalogs = api.catalogs();
        let created = catalogs.create(&spec()).await.unwrap();
        api.fail_deletes([503, 403]);

        let first = catalogs.delete(&created).await.unwrap_err();
        assert!(first.is_retryable());
        let second = catalogs.delete(&created).await.unwrap_err();
        assert!(!second.is_retryable());
        catalogs.delete(&created).await.unwrap();
    }

    #[tokio::test]
    async fn injected_state_is_reported() {
        let api = InMemoryApi::new();
        let catalogs = api.catalogs();
        let created = catalogs.create(&spec()).await.unwrap();

        api.inject_state::<Catalog>(&created.id, "error").unwrap();
        assert_eq!(catalogs.by_id(&created.id).await.unwrap().state, "error");

        assert!(api.inject_state::<Catalog>("missing", "error").is_err());
    }

    #[tokio::test]
    async fn clones_share_the_store() {
        let api = InMemoryApi::new();
        let created = api.catalogs().create(&spec()).await.unwrap();
        let other = api.clone();
        assert!(other.contains::<Catalog>(&created.id));
    }
}
