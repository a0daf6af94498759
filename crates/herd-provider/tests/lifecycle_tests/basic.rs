//! A catalog is created, updated, recreated and destroyed
//!
//! Every step is followed by an existence check that compares the catalog the
//! API reports with the settings just applied.

use herd_provider::checks::{check_destroyed, check_destroyed_all, check_exists, disappear};
use herd_provider::client::memory::InMemoryApi;
use herd_provider::{Catalog, ResourceClient};

use super::helpers::{
    foo_spec, foo_updated_spec, quick_removal, FOO_DESCRIPTION, FOO_UPDATED_DESCRIPTION,
    FOO_UPDATED_URL, FOO_URL,
};

// =============================================================================
// Create / update / recreate
// =============================================================================

#[tokio::test(start_paused = true)]
async fn story_catalog_is_created_updated_and_recreated() {
    let api = InMemoryApi::new();
    let catalogs = api.catalogs();

    // Create
    let created = catalogs.create(&foo_spec()).await.unwrap();
    let found = check_exists(&catalogs, &created.id).await.unwrap();
    assert_eq!(found.name, "foo");
    assert_eq!(found.url, FOO_URL);
    assert_eq!(found.description, FOO_DESCRIPTION);
    assert_eq!(found.state, "active");

    // Update in place keeps the identity
    catalogs.update(&created.id, &foo_updated_spec()).await.unwrap();
    let found = check_exists(&catalogs, &created.id).await.unwrap();
    assert_eq!(found.id, created.id);
    assert_eq!(found.url, FOO_UPDATED_URL);
    assert_eq!(found.description, FOO_UPDATED_DESCRIPTION);

    // Recreate with the original settings
    catalogs.update(&created.id, &foo_spec()).await.unwrap();
    let found = check_exists(&catalogs, &created.id).await.unwrap();
    assert_eq!(found.url, FOO_URL);
    assert_eq!(found.description, FOO_DESCRIPTION);

    // Destroy and confirm nothing is left behind
    disappear(&catalogs, &created.id, &quick_removal())
        .await
        .unwrap();
    check_destroyed(&catalogs, &created.id).await.unwrap();
    assert_eq!(api.count::<Catalog>(), 0);
}

#[tokio::test(start_paused = true)]
async fn story_destroy_check_covers_every_tracked_catalog() {
    let api = InMemoryApi::new();
    let catalogs = api.catalogs();

    let first = catalogs.create(&foo_spec()).await.unwrap();
    let second = catalogs.create(&foo_updated_spec()).await.unwrap();
    let ids = [first.id.clone(), second.id.clone()];

    // Only one of them is gone: the check reports the survivor
    disappear(&catalogs, &first.id, &quick_removal())
        .await
        .unwrap();
    let err = check_destroyed_all(&catalogs, &ids).await.unwrap_err();
    assert_eq!(err.to_string(), format!("catalog ({}) still exists", second.id));

    disappear(&catalogs, &second.id, &quick_removal())
        .await
        .unwrap();
    check_destroyed_all(&catalogs, &ids).await.unwrap();
}

#[tokio::test]
async fn when_catalog_was_never_created_existence_check_fails() {
    let api = InMemoryApi::new();
    let err = check_exists(&api.catalogs(), "catalog-missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
