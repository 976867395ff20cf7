//! Snapshot cache with an explicit lifecycle.
//!
//! One [`SnapshotCache`] owns the last good [`RecordSet`] for a source. Reads
//! go through [`SnapshotCache::get`], which refreshes when the snapshot is
//! missing, invalidated or older than [`RefreshPolicy::max_age`]. A refresh
//! runs the source on a worker thread and waits at most
//! [`RefreshPolicy::fetch_timeout`] for it.
//!
//! At most one worker runs at a time. The worker, not the waiting caller,
//! reports completion, so a fetch that outlives its caller's deadline still
//! counts as in flight and later reads join it instead of starting another.
//! While it runs, readers that already hold a snapshot get that snapshot back
//! at once, flagged stale. After a failure, [`SnapshotCache::get`] keeps
//! serving the stale view until [`RefreshPolicy::retry_backoff`] has passed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use thiserror::Error;

use crate::models::RecordSet;
use crate::utils::time::unix_timestamp_ms;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5_000);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Anything that can produce a full [`RecordSet`].
///
/// Implementations should poll [`FetchContext::ensure_active`] between
/// expensive steps so an abandoned fetch stops early.
pub trait SnapshotSource: Send + Sync {
    fn describe(&self) -> String;

    fn load(&self, ctx: &FetchContext) -> Result<RecordSet>;
}

impl<T: SnapshotSource + ?Sized> SnapshotSource for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn load(&self, ctx: &FetchContext) -> Result<RecordSet> {
        (**self).load(ctx)
    }
}

#[derive(Debug, Clone)]
pub struct FetchContext {
    cancelled: Arc<AtomicBool>,
    deadline: Instant,
}

impl FetchContext {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: now.checked_add(timeout).unwrap_or(now),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) || Instant::now() >= self.deadline
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            anyhow::bail!("snapshot fetch cancelled");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub max_age: Duration,
    pub fetch_timeout: Duration,
    /// Minimum gap between a failed fetch and the next one `get` starts.
    pub retry_backoff: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("snapshot fetch from {source_name} timed out after {timeout_ms} ms")]
    TimedOut { source_name: String, timeout_ms: u64 },

    #[error("snapshot fetch from {source_name} failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    #[error("snapshot fetch worker for {source_name} exited without a result")]
    WorkerLost { source_name: String },
}

impl FetchError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TimedOut { .. } => "fetch_timed_out",
            Self::Source { .. } => "fetch_failed",
            Self::WorkerLost { .. } => "fetch_worker_lost",
        }
    }
}

/// What a reader sees: the records plus how trustworthy they are.
#[derive(Debug, Clone)]
pub struct SnapshotView {
    pub records: Arc<RecordSet>,
    /// Set when the last fetch failed or a due refresh has not landed yet.
    pub stale: bool,
    pub error: Option<FetchError>,
    pub loaded_at_unix_ms: Option<u64>,
    pub source: String,
}

#[derive(Debug)]
struct LoadedSnapshot {
    records: Arc<RecordSet>,
    loaded_at: Instant,
    loaded_at_unix_ms: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<LoadedSnapshot>,
    invalidated: bool,
    /// Bumped by `invalidate`; a fetch only clears invalidations older than it.
    generation: u64,
    last_error: Option<FetchError>,
    failed_at: Option<Instant>,
    /// Cancel handle of the running worker. `Some` exactly while one runs.
    in_flight: Option<FetchContext>,
    completed_fetches: u64,
}

impl CacheState {
    fn record_failure(&mut self, error: FetchError) {
        self.last_error = Some(error);
        self.failed_at = Some(Instant::now());
    }
}

struct Shared<S> {
    source: S,
    policy: RefreshPolicy,
    state: Mutex<CacheState>,
    fetch_done: Condvar,
}

impl<S> Shared<S> {
    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SnapshotCache<S> {
    shared: Arc<Shared<S>>,
}

impl<S: SnapshotSource + 'static> SnapshotCache<S> {
    #[must_use]
    pub fn new(source: S, policy: RefreshPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                policy,
                state: Mutex::new(CacheState::default()),
                fetch_done: Condvar::new(),
            }),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RefreshPolicy {
        self.shared.policy
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.shared.source
    }

    /// Current snapshot, refreshed first when it is missing or expired.
    ///
    /// Never starts a second fetch while one runs, and never retries a failed
    /// fetch before the backoff has passed.
    pub fn get(&self) -> SnapshotView {
        let state = self.shared.lock_state();
        if !self.needs_refresh(&state) {
            return self.view_of(&state, false);
        }
        if self.backing_off(&state) {
            return self.view_of(&state, true);
        }
        self.refresh_locked(state)
    }

    /// Forces a fetch, or joins the one already running.
    pub fn refresh(&self) -> SnapshotView {
        let state = self.shared.lock_state();
        self.refresh_locked(state)
    }

    /// Marks the snapshot for refresh on the next [`get`](Self::get).
    pub fn invalidate(&self) {
        let mut state = self.shared.lock_state();
        state.invalidated = true;
        state.generation = state.generation.wrapping_add(1);
        state.failed_at = None;
    }

    /// True while a worker is loading from the source.
    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.shared.lock_state().in_flight.is_some()
    }

    fn refresh_locked(&self, mut state: MutexGuard<'_, CacheState>) -> SnapshotView {
        let ticket = state.completed_fetches;
        let started_here = state.in_flight.is_none();

        if started_here {
            match self.spawn_fetch(&mut state) {
                Ok(ctx) => state.in_flight = Some(ctx),
                Err(error) => {
                    state.record_failure(error);
                    return self.view_of(&state, true);
                }
            }
        } else if state.snapshot.is_some() {
            tracing::debug!(
                source = %self.shared.source.describe(),
                "refresh already running; serving last snapshot"
            );
            return self.view_of(&state, true);
        } else {
            tracing::debug!(
                source = %self.shared.source.describe(),
                "joining in-flight refresh"
            );
        }

        let deadline = Instant::now() + self.shared.policy.fetch_timeout;
        while state.completed_fetches == ticket {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.timed_out(state, started_here);
            }
            state = self
                .shared
                .fetch_done
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        self.view_of(&state, false)
    }

    fn timed_out(
        &self,
        mut state: MutexGuard<'_, CacheState>,
        started_here: bool,
    ) -> SnapshotView {
        let source_name = self.shared.source.describe();
        if started_here && let Some(ctx) = &state.in_flight {
            ctx.cancel();
        }
        tracing::warn!(
            source = %source_name,
            has_previous = state.snapshot.is_some(),
            "snapshot refresh timed out; worker left to finish"
        );
        state.record_failure(FetchError::TimedOut {
            source_name,
            timeout_ms: u64::try_from(self.shared.policy.fetch_timeout.as_millis())
                .unwrap_or(u64::MAX),
        });
        self.view_of(&state, true)
    }

    fn spawn_fetch(&self, state: &mut CacheState) -> Result<FetchContext, FetchError> {
        let ctx = FetchContext::new(self.shared.policy.fetch_timeout);
        let generation = state.generation;
        let shared = Arc::clone(&self.shared);
        let worker_ctx = ctx.clone();

        thread::Builder::new()
            .name("qadash-fetch".to_string())
            .spawn(move || {
                let outcome = run_load(&shared.source, &worker_ctx);
                complete_fetch(&shared, outcome, generation);
            })
            .map_err(|error| FetchError::Source {
                source_name: self.shared.source.describe(),
                message: format!("failed to spawn fetch worker: {error}"),
            })?;
        Ok(ctx)
    }

    fn needs_refresh(&self, state: &CacheState) -> bool {
        match &state.snapshot {
            None => true,
            Some(loaded) => {
                state.invalidated || loaded.loaded_at.elapsed() >= self.shared.policy.max_age
            }
        }
    }

    fn backing_off(&self, state: &CacheState) -> bool {
        state.in_flight.is_none()
            && state.last_error.is_some()
            && state
                .failed_at
                .is_some_and(|failed_at| failed_at.elapsed() < self.shared.policy.retry_backoff)
    }

    fn view_of(&self, state: &CacheState, refresh_pending: bool) -> SnapshotView {
        let source = self.shared.source.describe();
        let stale = state.last_error.is_some() || (refresh_pending && state.snapshot.is_some());
        match &state.snapshot {
            Some(loaded) => SnapshotView {
                records: Arc::clone(&loaded.records),
                stale,
                error: state.last_error.clone(),
                loaded_at_unix_ms: Some(loaded.loaded_at_unix_ms),
                source,
            },
            None => SnapshotView {
                records: Arc::new(RecordSet::default()),
                stale,
                error: state.last_error.clone(),
                loaded_at_unix_ms: None,
                source,
            },
        }
    }
}

/// A panicking source surfaces as [`FetchError::WorkerLost`] so the slot is
/// still released.
fn run_load<S: SnapshotSource>(source: &S, ctx: &FetchContext) -> Result<RecordSet, FetchError> {
    match panic::catch_unwind(AssertUnwindSafe(|| source.load(ctx))) {
        Ok(Ok(records)) => Ok(records),
        Ok(Err(error)) => Err(FetchError::Source {
            source_name: source.describe(),
            message: format!("{error:#}"),
        }),
        Err(_) => Err(FetchError::WorkerLost {
            source_name: source.describe(),
        }),
    }
}

/// Runs on the worker: stores the outcome and wakes every waiter.
fn complete_fetch<S: SnapshotSource>(
    shared: &Shared<S>,
    outcome: Result<RecordSet, FetchError>,
    generation: u64,
) {
    let mut state = shared.lock_state();
    match outcome {
        Ok(records) => {
            state.snapshot = Some(LoadedSnapshot {
                records: Arc::new(records),
                loaded_at: Instant::now(),
                loaded_at_unix_ms: unix_timestamp_ms(),
            });
            state.invalidated = state.generation != generation;
            state.last_error = None;
            state.failed_at = None;
            tracing::debug!(source = %shared.source.describe(), "snapshot refreshed");
        }
        Err(error) => {
            tracing::warn!(
                error = %error,
                has_previous = state.snapshot.is_some(),
                "snapshot refresh failed"
            );
            state.record_failure(error);
        }
    }
    state.in_flight = None;
    state.completed_fetches = state.completed_fetches.wrapping_add(1);
    shared.fetch_done.notify_all();
}
