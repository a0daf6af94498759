//! Convergence polling for remote resource state
//!
//! After a mutating call (create, update, delete) the management API finishes
//! the work asynchronously. [`wait_for_state`] polls a caller-supplied probe
//! until the resource reports one of the target states, a terminal failure is
//! observed, or the timeout expires.
//!
//! # Example
//!
//! ```ignore
//! use herd_common::wait::{wait_for_state, Observation, PollSpec};
//!
//! let spec = PollSpec::new(["active"], ["removed"])
//!     .with_timeout(Duration::from_secs(600))
//!     .with_initial_delay(Duration::from_secs(1))
//!     .with_min_interval(Duration::from_secs(3));
//!
//! let done = wait_for_state(&spec, "catalog cat-foo", || async {
//!     match client.by_id("cat-foo").await {
//!         Ok(catalog) => Ok(Observation::found(catalog.state.clone(), catalog)),
//!         Err(e) if e.is_not_found() => Ok(Observation::NotFound),
//!         Err(e) => Err(e),
//!     }
//! })
//! .await?;
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::{STATE_ERROR, STATE_REMOVED};

/// Default overall timeout (10 minutes)
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Default cap for the geometric backoff between probes
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of consecutive not-found observations tolerated while the
/// resource is expected to exist
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// First backoff step before doubling
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Errors that end a wait
#[derive(Debug, Error)]
pub enum WaitError {
    /// The deadline passed while the resource was still pending
    #[error(
        "timed out after {timeout:?} (last state: {})",
        .last_state.as_deref().unwrap_or("none")
    )]
    Timeout {
        /// The configured timeout
        timeout: Duration,
        /// Last state the probe reported, if any
        last_state: Option<String>,
    },

    /// The probe reported a state outside the pending and target sets
    #[error("unexpected state '{state}', wanted {expected:?}")]
    UnexpectedState {
        /// The observed state
        state: String,
        /// The target states
        expected: Vec<String>,
    },

    /// The remote system reported a terminal error state
    #[error("resource entered failure state '{state}'")]
    FailureState {
        /// The observed failure state
        state: String,
    },

    /// The resource kept disappearing while it was expected to exist
    #[error("resource not found after {checks} consecutive checks")]
    NotFound {
        /// Consecutive not-found observations
        checks: u32,
    },

    /// The refresh probe itself failed
    #[error("refresh failed: {source}")]
    Probe {
        /// Error returned by the probe
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The wait was cancelled from outside
    #[error(
        "wait cancelled (last state: {})",
        .last_state.as_deref().unwrap_or("none")
    )]
    Cancelled {
        /// Last state the probe reported, if any
        last_state: Option<String>,
    },

    /// The poll spec is inconsistent
    #[error("invalid poll spec: {0}")]
    InvalidSpec(String),
}

/// One observation made by a refresh probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation<T> {
    /// The resource exists and reports `state`
    Found {
        /// The resource as returned by the API
        resource: T,
        /// Its lifecycle state
        state: String,
    },
    /// The resource does not exist (any more)
    NotFound,
}

impl<T> Observation<T> {
    /// Observation of an existing resource
    pub fn found(state: impl Into<String>, resource: T) -> Self {
        Self::Found {
            resource,
            state: state.into(),
        }
    }

    /// The reported state, if the resource exists
    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Found { state, .. } => Some(state),
            Self::NotFound => None,
        }
    }
}

/// How a reported state relates to a [`PollSpec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// Success
    Target,
    /// Keep polling
    Pending,
    /// Terminal error reported by the remote system
    Failure,
    /// Not in any of the poll spec's sets
    Unexpected,
}

/// Configuration for one wait
///
/// Built per operation and consumed by a single call to [`wait_for_state`].
#[derive(Clone, Debug)]
pub struct PollSpec {
    /// States meaning "still in progress"
    pub pending: BTreeSet<String>,
    /// States meaning success
    pub target: BTreeSet<String>,
    /// States meaning the remote side gave up
    pub failure: BTreeSet<String>,
    /// Maximum time to wait, measured after the initial delay
    pub timeout: Duration,
    /// Time to wait before the first probe
    pub initial_delay: Duration,
    /// Floor for the time between probes
    pub min_interval: Duration,
    /// Cap for the geometric backoff
    pub max_interval: Duration,
    /// Fixed time between probes instead of backoff (still floored by `min_interval`)
    pub poll_interval: Option<Duration>,
    /// Consecutive not-found observations tolerated when not waiting for removal
    pub not_found_checks: u32,
    /// Consecutive target observations required for success
    pub target_occurrences: u32,
}

impl PollSpec {
    /// Create a spec with the given pending and target states and defaults for the rest
    pub fn new<P, T>(pending: P, target: T) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            failure: BTreeSet::from([STATE_ERROR.to_string()]),
            timeout: DEFAULT_WAIT_TIMEOUT,
            initial_delay: Duration::ZERO,
            min_interval: Duration::ZERO,
            max_interval: DEFAULT_MAX_INTERVAL,
            poll_interval: None,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            target_occurrences: 1,
        }
    }

    /// Set the overall timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay before the first probe
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the floor for the time between probes
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set the backoff cap
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Poll at a fixed interval instead of backing off
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Replace the failure states
    pub fn with_failure<I>(mut self, failure: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.failure = failure.into_iter().map(Into::into).collect();
        self
    }

    /// Set how many consecutive not-found observations are tolerated
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Require the target state to be seen this many times in a row
    pub fn with_target_occurrences(mut self, occurrences: u32) -> Self {
        self.target_occurrences = occurrences;
        self
    }

    /// Check the state sets and counts for contradictions
    pub fn validate(&self) -> Result<(), WaitError> {
        if self.pending.is_empty() && self.target.is_empty() {
            return Err(WaitError::InvalidSpec(
                "pending and target states cannot both be empty".to_string(),
            ));
        }
        if self.target_occurrences == 0 {
            return Err(WaitError::InvalidSpec(
                "target occurrences must be at least 1".to_string(),
            ));
        }

        let sets = [
            ("pending", &self.pending),
            ("target", &self.target),
            ("failure", &self.failure),
        ];
        for (i, (left_name, left)) in sets.iter().enumerate() {
            for (right_name, right) in &sets[i + 1..] {
                if let Some(state) = left.intersection(right).next() {
                    return Err(WaitError::InvalidSpec(format!(
                        "state '{}' is both {} and {}",
                        state, left_name, right_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Classify a reported state
    pub fn classify(&self, state: &str) -> StateClass {
        if self.target.contains(state) {
            StateClass::Target
        } else if self.failure.contains(state) {
            StateClass::Failure
        } else if self.pending.contains(state) {
            StateClass::Pending
        } else {
            StateClass::Unexpected
        }
    }

    /// Whether a not-found observation means the target was reached
    pub fn awaits_removal(&self) -> bool {
        self.target.is_empty() || self.target.contains(STATE_REMOVED)
    }

    /// Time to sleep before the next probe given the current backoff step
    fn interval(&self, backoff: Duration) -> Duration {
        self.poll_interval.unwrap_or(backoff).max(self.min_interval)
    }

    fn next_backoff(&self, backoff: Duration) -> Duration {
        backoff.saturating_mul(2).min(self.max_interval)
    }

    fn expected(&self) -> Vec<String> {
        self.target.iter().cloned().collect()
    }
}

/// Successful outcome of a wait
#[derive(Debug, Clone)]
pub struct Convergence<T> {
    /// The target state that was reached
    pub state: String,
    /// The resource from the final observation; `None` when it no longer exists
    pub resource: Option<T>,
    /// Number of probe invocations
    pub attempts: u32,
    /// Time spent after the initial delay
    pub elapsed: Duration,
}

/// Wait until the probe reports a target state.
///
/// # Arguments
/// * `spec` - Pending/target states and timing
/// * `description` - Human-readable description for logging
/// * `probe` - Async function that observes the resource once
///
/// # Returns
/// The reached state, or the first terminal condition. Probe errors are never
/// retried; only pending states keep the loop going.
pub async fn wait_for_state<T, E, F, Fut>(
    spec: &PollSpec,
    description: &str,
    probe: F,
) -> Result<Convergence<T>, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    wait_for_state_until_cancelled(spec, description, &CancellationToken::new(), probe).await
}

/// Like [`wait_for_state`], but gives up with [`WaitError::Cancelled`] once
/// `cancel` fires. Cancellation is observed between probes.
pub async fn wait_for_state_until_cancelled<T, E, F, Fut>(
    spec: &PollSpec,
    description: &str,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<Convergence<T>, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    spec.validate()?;

    if !spec.initial_delay.is_zero() {
        trace!(resource = %description, delay = ?spec.initial_delay, "Delaying first probe");
        if !sleep_or_cancel(spec.initial_delay, cancel).await {
            return Err(WaitError::Cancelled { last_state: None });
        }
    }

    let start = Instant::now();
    // A timeout past the clock's range means no deadline
    let deadline = start.checked_add(spec.timeout);
    let mut backoff = INITIAL_BACKOFF;
    let mut attempts = 0u32;
    let mut not_found = 0u32;
    let mut target_seen = 0u32;
    let mut last_state: Option<String> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(WaitError::Cancelled { last_state });
        }

        attempts += 1;
        let observation = probe().await.map_err(|e| {
            let source: Box<dyn std::error::Error + Send + Sync> = e.into();
            debug!(resource = %description, attempt = attempts, error = %source, "Refresh failed");
            WaitError::Probe { source }
        })?;

        let observed = match observation {
            Observation::Found { resource, state } => {
                not_found = 0;
                let class = spec.classify(&state);
                Some((state, Some(resource), class))
            }
            Observation::NotFound if spec.awaits_removal() => {
                Some((STATE_REMOVED.to_string(), None, StateClass::Target))
            }
            Observation::NotFound => {
                not_found += 1;
                target_seen = 0;
                if not_found > spec.not_found_checks {
                    return Err(WaitError::NotFound { checks: not_found });
                }
                trace!(resource = %description, checks = not_found, "Resource not found yet");
                None
            }
        };

        if let Some((state, resource, class)) = observed {
            match class {
                StateClass::Target => {
                    target_seen += 1;
                    if target_seen >= spec.target_occurrences {
                        let elapsed = start.elapsed();
                        info!(
                            resource = %description,
                            state = %state,
                            attempts = attempts,
                            elapsed_ms = elapsed.as_millis(),
                            "Reached target state"
                        );
                        return Ok(Convergence {
                            state,
                            resource,
                            attempts,
                            elapsed,
                        });
                    }
                    trace!(
                        resource = %description,
                        seen = target_seen,
                        required = spec.target_occurrences,
                        "Target state seen, confirming"
                    );
                }
                StateClass::Failure => return Err(WaitError::FailureState { state }),
                StateClass::Pending => {
                    target_seen = 0;
                    debug!(resource = %description, state = %state, attempt = attempts, "Still pending");
                }
                StateClass::Unexpected => {
                    return Err(WaitError::UnexpectedState {
                        state,
                        expected: spec.expected(),
                    })
                }
            }
            last_state = Some(state);
        }

        let mut sleep_for = spec.interval(backoff);
        if let Some(deadline) = deadline {
            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::Timeout {
                    timeout: spec.timeout,
                    last_state,
                });
            }
            sleep_for = sleep_for.min(deadline - now);
        }
        backoff = spec.next_backoff(backoff);
        if !sleep_or_cancel(sleep_for, cancel).await {
            return Err(WaitError::Cancelled { last_state });
        }
    }
}

/// Sleep for `duration`; returns false if `cancel` fired first
async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
