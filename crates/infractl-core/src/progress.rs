//! Convergence polling for eventually consistent objects
//!
//! A mutation accepted by the control plane is applied asynchronously, so the
//! caller re-reads the object until its status lands in a target set. This
//! module holds the single state machine every lifecycle call uses:
//!
//! - **Polling**: wait, check cancellation and the deadline, refresh
//! - **Converged**: the refreshed state is a target (or the object is absent
//!   and absence is the target)
//! - **Failed**: deadline, cancellation, not-found budget, a failure state, or
//!   a fatal refresh error
//!
//! Progress events are emitted to an optional callback so a CLI can drive a
//! spinner while library callers stay silent.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

/// What one refresh observed
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<T> {
    /// The object exists and reports `state`
    Found { snapshot: T, state: String },
    /// The object does not exist (yet, or any more)
    NotFound,
}

impl<T> Observation<T> {
    /// Shorthand for [`Observation::Found`]
    pub fn found(snapshot: T, state: impl Into<String>) -> Self {
        Observation::Found {
            snapshot,
            state: state.into(),
        }
    }
}

/// How a "not found" refresh is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Absence {
    /// The object should appear; absence spends the not-found budget
    #[default]
    Pending,
    /// The object should disappear; absence is convergence
    Target,
}

/// Cadence and limits for one wait
#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    /// Overall deadline, measured from the start of polling
    pub timeout: Duration,
    /// Delay before the first refresh and nominal spacing afterwards
    pub delay: Duration,
    /// Floor on the spacing between refreshes
    pub min_interval: Duration,
    /// Consecutive not-found refreshes tolerated with [`Absence::Pending`]
    pub not_found_budget: u32,
}

impl WaitConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);
    pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(3);
    pub const DEFAULT_NOT_FOUND_BUDGET: u32 = 120;

    /// Defaults scaled for long-running provisioning (30 minute deadline)
    pub fn long_running() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            ..Self::default()
        }
    }

    /// Spacing between refreshes after the first
    pub fn interval(&self) -> Duration {
        self.delay.max(self.min_interval)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            delay: Self::DEFAULT_DELAY,
            min_interval: Self::DEFAULT_MIN_INTERVAL,
            not_found_budget: Self::DEFAULT_NOT_FOUND_BUDGET,
        }
    }
}

/// Pending, target and failure vocabularies for one wait
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSet {
    pub pending: HashSet<String>,
    pub target: HashSet<String>,
    pub failure: HashSet<String>,
}

impl StateSet {
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
            failure: HashSet::new(),
        }
    }

    /// Declare states that end the wait as a failure
    pub fn with_failure<F>(mut self, failure: F) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
    {
        self.failure = failure.into_iter().map(Into::into).collect();
        self
    }

    /// Vocabulary for objects being created
    pub fn create() -> Self {
        Self::new(["PENDING", "CREATING"], ["ACTIVE"]).with_failure(["ERROR"])
    }

    /// Vocabulary for objects being updated
    pub fn update() -> Self {
        Self::new(["PENDING", "UPDATING"], ["ACTIVE"]).with_failure(["ERROR"])
    }

    /// Vocabulary for objects being deleted; absence also converges
    pub fn delete() -> Self {
        Self::new(["PENDING", "DELETING", "ACTIVE", "IN_ACTIVE"], ["DELETED"])
            .with_failure(["ERROR"])
    }
}

/// Progress events emitted while polling
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Polling has started
    Started { label: String },
    /// A refresh returned a state that is not terminal
    Polling {
        label: String,
        state: String,
        attempt: u32,
        elapsed: Duration,
    },
    /// A refresh did not find the object
    NotFound {
        label: String,
        consecutive: u32,
        budget: u32,
    },
    /// Polling converged; `state` is `None` when absence was the target
    Converged {
        label: String,
        state: Option<String>,
    },
    /// Polling stopped with a failure
    Failed { label: String, error: String },
}

/// Callback type for progress updates
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

/// Everything one wait needs. Built fresh per operation and consumed by [`poll`].
pub struct PollSpec<F> {
    label: String,
    states: StateSet,
    refresh: F,
    config: WaitConfig,
    absence: Absence,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
}

impl<F> PollSpec<F> {
    /// New spec with default cadence and the create vocabulary.
    ///
    /// `label` names the object in logs and progress events.
    pub fn new(label: impl Into<String>, refresh: F) -> Self {
        Self {
            label: label.into(),
            states: StateSet::create(),
            refresh,
            config: WaitConfig::default(),
            absence: Absence::default(),
            cancel: CancellationToken::new(),
            on_progress: None,
        }
    }

    pub fn states(mut self, states: StateSet) -> Self {
        self.states = states;
        self
    }

    pub fn pending<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.states.pending = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn target<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.states.target = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn failure<I>(mut self, states: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.states.failure = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn wait_config(mut self, config: WaitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    pub fn min_interval(mut self, min_interval: Duration) -> Self {
        self.config.min_interval = min_interval;
        self
    }

    pub fn not_found_budget(mut self, budget: u32) -> Self {
        self.config.not_found_budget = budget;
        self
    }

    pub fn absence(mut self, absence: Absence) -> Self {
        self.absence = absence;
        self
    }

    /// Abort polling when `token` is cancelled
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Why polling stopped, together with the last snapshot seen
#[derive(Debug)]
pub struct PollFailure<T> {
    /// Last snapshot observed before giving up
    pub last_snapshot: Option<T>,
    /// The reason polling stopped
    pub error: CoreError,
}

impl<T> PollFailure<T> {
    pub fn error(&self) -> &CoreError {
        &self.error
    }

    pub fn into_error(self) -> CoreError {
        self.error
    }
}

impl<T> fmt::Display for PollFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<T: fmt::Debug> std::error::Error for PollFailure<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Poll until the object converges.
///
/// The first refresh happens after `delay`; later refreshes are spaced by
/// `max(delay, min_interval)`, never past the deadline. Cancellation and the
/// deadline are checked before every refresh, and only the waits between
/// refreshes are suspended.
///
/// Returns `Ok(Some(snapshot))` when a target state is observed, `Ok(None)`
/// when the object is absent and absence is the target. Failures carry the
/// last observed snapshot.
///
/// # Example
///
/// ```rust,ignore
/// use infractl_core::progress::{poll, Observation, PollSpec};
///
/// let spec = PollSpec::new("network net-1", || async {
///     let net = api.get_network("net-1").await?;
///     Ok(Observation::found(net.clone(), net.status))
/// })
/// .pending(["PENDING", "CREATING"])
/// .target(["ACTIVE"]);
///
/// let network = poll(spec).await?;
/// ```
pub async fn poll<T, F, Fut>(spec: PollSpec<F>) -> std::result::Result<Option<T>, PollFailure<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation<T>>>,
{
    let PollSpec {
        label,
        states,
        mut refresh,
        config,
        absence,
        cancel,
        on_progress,
    } = spec;

    let start = Instant::now();
    let deadline = start.checked_add(config.timeout).unwrap_or_else(far_future);
    let mut last_snapshot: Option<T> = None;
    let mut last_state: Option<String> = None;
    let mut consecutive_not_found = 0u32;
    let mut attempt = 0u32;
    let mut wait = config.delay;

    debug!(
        %label,
        timeout = ?config.timeout,
        delay = ?config.delay,
        min_interval = ?config.min_interval,
        ?absence,
        "waiting for target state"
    );
    emit(
        &on_progress,
        ProgressEvent::Started {
            label: label.clone(),
        },
    );

    loop {
        if !pause(wait, deadline, &cancel).await {
            let error = CoreError::PollCancelled;
            return Err(fail(&on_progress, &label, last_snapshot, error));
        }
        wait = config.interval();

        if Instant::now() >= deadline {
            let error = CoreError::PollTimeout {
                timeout: config.timeout,
                last_state,
            };
            return Err(fail(&on_progress, &label, last_snapshot, error));
        }

        attempt += 1;
        let observation = match refresh().await {
            Ok(observation) => observation,
            Err(error) => return Err(fail(&on_progress, &label, last_snapshot, error)),
        };

        match observation {
            Observation::Found { snapshot, state } => {
                consecutive_not_found = 0;
                debug!(%label, %state, attempt, "refreshed");
                emit(
                    &on_progress,
                    ProgressEvent::Polling {
                        label: label.clone(),
                        state: state.clone(),
                        attempt,
                        elapsed: start.elapsed(),
                    },
                );

                if states.target.contains(&state) {
                    info!(%label, %state, attempt, elapsed = ?start.elapsed(), "converged");
                    emit(
                        &on_progress,
                        ProgressEvent::Converged {
                            label: label.clone(),
                            state: Some(state),
                        },
                    );
                    return Ok(Some(snapshot));
                }

                if states.failure.contains(&state) {
                    let error = CoreError::ResourceFailed { state };
                    return Err(fail(&on_progress, &label, Some(snapshot), error));
                }

                if !states.pending.contains(&state) {
                    warn!(%label, %state, "unrecognized state, still waiting");
                }
                last_state = Some(state);
                last_snapshot = Some(snapshot);
            }
            Observation::NotFound => match absence {
                Absence::Target => {
                    info!(%label, attempt, "object is gone");
                    emit(
                        &on_progress,
                        ProgressEvent::Converged {
                            label: label.clone(),
                            state: None,
                        },
                    );
                    return Ok(None);
                }
                Absence::Pending => {
                    consecutive_not_found += 1;
                    debug!(
                        %label,
                        consecutive_not_found,
                        budget = config.not_found_budget,
                        "object not found yet"
                    );
                    emit(
                        &on_progress,
                        ProgressEvent::NotFound {
                            label: label.clone(),
                            consecutive: consecutive_not_found,
                            budget: config.not_found_budget,
                        },
                    );
                    if consecutive_not_found >= config.not_found_budget {
                        let error = CoreError::NotFoundExceeded {
                            attempts: consecutive_not_found,
                        };
                        return Err(fail(&on_progress, &label, last_snapshot, error));
                    }
                }
            },
        }
    }
}

/// Sleep for `duration` but not past `deadline`. Returns false if cancelled.
async fn pause(duration: Duration, deadline: Instant, cancel: &CancellationToken) -> bool {
    let until = Instant::now()
        .checked_add(duration)
        .map_or(deadline, |t| t.min(deadline));
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep_until(until) => true,
    }
}

/// Stand-in deadline for timeouts too large to represent
fn far_future() -> Instant {
    // About 30 years
    Instant::now() + Duration::from_secs(86_400 * 365 * 30)
}

fn fail<T>(
    callback: &Option<ProgressCallback>,
    label: &str,
    last_snapshot: Option<T>,
    error: CoreError,
) -> PollFailure<T> {
    warn!(%label, %error, "stopped waiting");
    emit(
        callback,
        ProgressEvent::Failed {
            label: label.to_string(),
            error: error.to_string(),
        },
    );
    PollFailure {
        last_snapshot,
        error,
    }
}

/// Helper to emit progress events
fn emit(callback: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_config_defaults() {
        let config = WaitConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.delay, Duration::from_secs(3));
        assert_eq!(config.min_interval, Duration::from_secs(3));
        assert_eq!(config.not_found_budget, 120);
        assert_eq!(WaitConfig::long_running().timeout, Duration::from_secs(1800));
    }

    #[test]
    fn test_interval_uses_the_larger_spacing() {
        let config = WaitConfig {
            delay: Duration::from_secs(1),
            min_interval: Duration::from_secs(5),
            ..WaitConfig::default()
        };
        assert_eq!(config.interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_state_set_vocabularies() {
        let create = StateSet::create();
        assert!(create.pending.contains("CREATING"));
        assert!(create.target.contains("ACTIVE"));
        assert!(create.failure.contains("ERROR"));

        let delete = StateSet::delete();
        assert!(delete.pending.contains("DELETING"));
        assert!(!delete.target.contains("ACTIVE"));
    }
}
