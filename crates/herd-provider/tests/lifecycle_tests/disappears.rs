//! A catalog is deleted out of band
//!
//! The deletion is accepted immediately but the API keeps reporting the
//! catalog as `removing` for a while. The poller must ride that out and only
//! succeed once the catalog is really gone.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use herd_common::wait::WaitError;
use herd_common::Error;
use herd_provider::checks::{
    check_destroyed, check_exists, disappear, disappear_until_cancelled, removal_spec,
    removal_spec_with,
};
use herd_provider::client::memory::InMemoryApi;
use herd_provider::{Catalog, ResourceClient};

use super::helpers::{foo_spec, quick_removal};

// =============================================================================
// Out-of-band deletion
// =============================================================================

#[tokio::test(start_paused = true)]
async fn story_catalog_disappears_after_asynchronous_removal() {
    let api = InMemoryApi::with_removal_lag(3);
    let catalogs = api.catalogs();
    let created = catalogs.create(&foo_spec()).await.unwrap();
    check_exists(&catalogs, &created.id).await.unwrap();

    let start = Instant::now();
    disappear(&catalogs, &created.id, &removal_spec())
        .await
        .unwrap();

    // Three reads still see "removing", the fourth finds nothing:
    // 1s initial delay plus three 3s intervals
    assert!(start.elapsed() >= Duration::from_secs(10));
    check_destroyed(&catalogs, &created.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn story_transient_delete_failures_do_not_fail_the_step() {
    let api = InMemoryApi::new();
    let catalogs = api.catalogs();
    let created = catalogs.create(&foo_spec()).await.unwrap();
    api.fail_deletes([503, 502]);

    disappear(&catalogs, &created.id, &quick_removal())
        .await
        .unwrap();
    check_destroyed(&catalogs, &created.id).await.unwrap();
}

#[tokio::test]
async fn when_delete_is_forbidden_the_catalog_stays() {
    let api = InMemoryApi::new();
    let catalogs = api.catalogs();
    let created = catalogs.create(&foo_spec()).await.unwrap();
    api.fail_deletes([403]);

    let err = disappear(&catalogs, &created.id, &quick_removal())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { retryable: false, .. }));
    check_exists(&catalogs, &created.id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn when_removal_outlasts_the_timeout_the_wait_names_the_catalog() {
    let api = InMemoryApi::with_removal_lag(u32::MAX);
    let catalogs = api.catalogs();
    let created = catalogs.create(&foo_spec()).await.unwrap();

    let spec = removal_spec_with(
        Duration::from_secs(30),
        Duration::from_secs(1),
        Duration::from_secs(3),
    );
    let err = disappear(&catalogs, &created.id, &spec).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Wait {
            source: WaitError::Timeout { .. },
            ..
        }
    ));
    assert_eq!(
        err.to_string(),
        format!(
            "waiting for catalog ({}) to be removed: timed out after 30s (last state: removing)",
            created.id
        )
    );
}

#[tokio::test(start_paused = true)]
async fn when_the_catalog_reports_an_error_the_wait_stops() {
    let api = InMemoryApi::with_removal_lag(u32::MAX);
    let catalogs = api.catalogs();
    let created = catalogs.create(&foo_spec()).await.unwrap();
    catalogs.delete(&created).await.unwrap();
    api.inject_state::<Catalog>(&created.id, "error").unwrap();

    let err = disappear(&catalogs, &created.id, &quick_removal())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Wait {
            source: WaitError::FailureState { .. },
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn when_cancelled_the_wait_ends_early() {
    let api = InMemoryApi::with_removal_lag(u32::MAX);
    let catalogs = api.catalogs();
    let created = catalogs.create(&foo_spec()).await.unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = disappear_until_cancelled(&catalogs, &created.id, &removal_spec(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Wait {
            source: WaitError::Cancelled { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn when_the_catalog_is_already_gone_disappear_succeeds() {
    let api = InMemoryApi::new();
    disappear(&api.catalogs(), "catalog-missing", &quick_removal())
        .await
        .unwrap();
}
