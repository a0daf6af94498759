//! Resource lifecycle checks
//!
//! Thin consumers of the [`ResourceClient`] seam and the convergence poller:
//! - [`check_exists`] looks a resource up and returns it
//! - [`check_destroyed`] asserts a resource is gone
//! - [`disappear`] deletes a resource out of band and waits until the API
//!   reports it removed

use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use herd_common::retry::{retry_with_backoff_if, RetryConfig};
use herd_common::wait::{
    wait_for_state_until_cancelled, Convergence, Observation, PollSpec, DEFAULT_WAIT_TIMEOUT,
};
use herd_common::{Error, Result, STATE_ACTIVE, STATE_REMOVED, STATE_REMOVING};

use crate::client::{ApiError, ApiObject, ResourceClient};

/// Delay before the first removal probe
pub const REMOVAL_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Minimum time between removal probes
pub const REMOVAL_MIN_INTERVAL: Duration = Duration::from_secs(3);

/// Attempts for a delete request that fails transiently
const DELETE_ATTEMPTS: u32 = 3;

/// Action phrase used when a removal wait fails
const REMOVAL_ACTION: &str = "be removed";

/// Poll spec for waiting on a deletion with the default timing
///
/// `removing` is pending alongside `active` because the API reports it while
/// a deletion finishes asynchronously.
pub fn removal_spec() -> PollSpec {
    removal_spec_with(
        DEFAULT_WAIT_TIMEOUT,
        REMOVAL_INITIAL_DELAY,
        REMOVAL_MIN_INTERVAL,
    )
}

/// Poll spec for waiting on a deletion
pub fn removal_spec_with(timeout: Duration, delay: Duration, min_interval: Duration) -> PollSpec {
    PollSpec::new([STATE_ACTIVE, STATE_REMOVING], [STATE_REMOVED])
        .with_timeout(timeout)
        .with_initial_delay(delay)
        .with_min_interval(min_interval)
}

/// Build a refresh probe that reports the lifecycle state of one resource
///
/// A missing resource, or one reporting no state at all, is observed as
/// [`Observation::NotFound`]. Every other client failure ends the wait.
pub fn state_refresh<'a, C>(
    client: &'a C,
    id: &'a str,
) -> impl FnMut() -> BoxFuture<'a, std::result::Result<Observation<C::Resource>, ApiError>> + 'a
where
    C: ResourceClient,
{
    move || {
        Box::pin(async move {
            match client.by_id(id).await {
                Ok(resource) if resource.state().is_empty() => Ok(Observation::NotFound),
                Ok(resource) => {
                    let state = resource.state().to_string();
                    Ok(Observation::found(state, resource))
                }
                Err(e) if e.is_not_found() => Ok(Observation::NotFound),
                Err(e) => Err(e),
            }
        })
    }
}

/// Look a resource up and return it
///
/// # Errors
/// `Validation` for an empty id, `NotFound` when the API has no such
/// resource, `Api` for any other failure.
pub async fn check_exists<C>(client: &C, id: &str) -> Result<C::Resource>
where
    C: ResourceClient,
{
    let kind = <C::Resource as ApiObject>::KIND;
    if id.is_empty() {
        return Err(Error::validation_for_field(
            "id",
            format!("no {} id is set", kind),
        ));
    }

    let resource = client
        .by_id(id)
        .await
        .map_err(|e| e.for_resource(kind, id))?;
    debug!(kind, id = %id, state = %resource.state(), "Resource exists");
    Ok(resource)
}

/// Assert a resource no longer exists
pub async fn check_destroyed<C>(client: &C, id: &str) -> Result<()>
where
    C: ResourceClient,
{
    let kind = <C::Resource as ApiObject>::KIND;
    match client.by_id(id).await {
        Ok(_) => Err(Error::still_exists(kind, id)),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.for_resource(kind, id)),
    }
}

/// Assert every listed resource no longer exists, stopping at the first survivor
pub async fn check_destroyed_all<C, I, S>(client: &C, ids: I) -> Result<()>
where
    C: ResourceClient,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for id in ids {
        check_destroyed(client, id.as_ref()).await?;
    }
    Ok(())
}

/// Request deletion, retrying transient API failures
///
/// A resource that is already gone counts as deleted.
pub async fn delete_resource<C>(client: &C, resource: &C::Resource) -> Result<()>
where
    C: ResourceClient,
{
    let kind = <C::Resource as ApiObject>::KIND;
    let id = resource.id();
    let operation = format!("delete {} {}", kind, id);

    match retry_with_backoff_if(
        &RetryConfig::with_max_attempts(DELETE_ATTEMPTS),
        &operation,
        || client.delete(resource),
        ApiError::is_retryable,
    )
    .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(kind, id = %id, "Already deleted");
            Ok(())
        }
        Err(e) => Err(e.for_resource(kind, id)),
    }
}

/// Wait until the API reports a resource removed
pub async fn wait_for_removal<C>(
    client: &C,
    id: &str,
    spec: &PollSpec,
    cancel: &CancellationToken,
) -> Result<Convergence<C::Resource>>
where
    C: ResourceClient,
{
    let kind = <C::Resource as ApiObject>::KIND;
    let description = format!("{} {}", kind, id);
    wait_for_state_until_cancelled(spec, &description, cancel, state_refresh(client, id))
        .await
        .map_err(|e| Error::wait(kind, id, REMOVAL_ACTION, e))
}

/// Delete a resource and wait until it is removed
///
/// A resource that is already gone is not an error.
pub async fn disappear<C>(client: &C, id: &str, spec: &PollSpec) -> Result<()>
where
    C: ResourceClient,
{
    disappear_until_cancelled(client, id, spec, &CancellationToken::new()).await
}

/// Like [`disappear`], but gives up once `cancel` fires
#[instrument(skip(client, spec, cancel))]
pub async fn disappear_until_cancelled<C>(
    client: &C,
    id: &str,
    spec: &PollSpec,
    cancel: &CancellationToken,
) -> Result<()>
where
    C: ResourceClient,
{
    let kind = <C::Resource as ApiObject>::KIND;
    let resource = match client.by_id(id).await {
        Ok(resource) => resource,
        Err(e) if e.is_not_found() => {
            info!(kind, id = %id, "Resource already gone");
            return Ok(());
        }
        Err(e) => return Err(e.for_resource(kind, id)),
    };

    delete_resource(client, &resource).await?;

    let done = wait_for_removal(client, id, spec, cancel).await?;
    info!(
        kind,
        id = %id,
        attempts = done.attempts,
        elapsed_ms = done.elapsed.as_millis() as u64,
        "Resource removed"
    );
    Ok(())
}
