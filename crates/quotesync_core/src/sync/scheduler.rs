//! Periodic fetch-reconcile-persist driver.
//!
//! # Responsibility
//! - Trigger one reconciliation attempt immediately, then every interval,
//!   until stopped.
//! - Enforce at-most-one in-flight tick structurally, without locking the
//!   store during the remote fetch.
//!
//! # Invariants
//! - A failed fetch skips the tick and leaves the store untouched.
//! - `stop()` takes effect before the next tick; an in-flight fetch runs
//!   to completion and its result is discarded.
//! - The store lock is held only for the reconcile-persist section, never
//!   across the fetch.

use crate::model::quote::Quote;
use crate::repo::snapshot_repo::SnapshotRepository;
use crate::service::quote_store::{QuoteStore, StoreError};
use crate::sync::reconcile::reconcile;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Injected transport boundary.
///
/// Implementations own the wire details (HTTP client, payload mapping,
/// request timeout) and hand back quote-shaped records.
pub trait RemoteQuoteSource: Send + Sync {
    fn fetch_quotes(&self) -> Result<Vec<Quote>, FetchError>;
}

impl<S: RemoteQuoteSource + ?Sized> RemoteQuoteSource for Arc<S> {
    fn fetch_quotes(&self) -> Result<Vec<Quote>, FetchError> {
        (**self).fetch_quotes()
    }
}

/// Transport-boundary failure for one fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Connection-level failure (DNS, refused, timeout).
    Transport(String),
    /// Non-2xx response from the remote endpoint.
    HttpStatus(u16),
    /// Response body could not be mapped to quote records.
    MalformedPayload(String),
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "transport failure: {message}"),
            Self::HttpStatus(status) => write!(f, "remote returned status {status}"),
            Self::MalformedPayload(message) => {
                write!(f, "malformed remote payload: {message}")
            }
        }
    }
}

impl Error for FetchError {}

/// Failure of one tick; never fatal to the loop.
#[derive(Debug)]
pub enum SyncError {
    Fetch(FetchError),
    Store(StoreError),
    StorePoisoned,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::StorePoisoned => write!(f, "store mutex was poisoned by a panicked holder"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Fetch(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::StorePoisoned => None,
        }
    }
}

impl From<FetchError> for SyncError {
    fn from(value: FetchError) -> Self {
        Self::Fetch(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// What one successful tick did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub changed: bool,
    pub added: usize,
    pub updated: usize,
}

/// Result of one tick attempt.
#[derive(Debug)]
pub enum TickOutcome {
    /// Fetch and reconciliation ran; the observer was notified.
    Completed(SyncReport),
    /// Fetch or persistence failed; the store is unchanged.
    Failed(SyncError),
    /// Another tick was in flight; this one was skipped.
    SkippedBusy,
    /// Stop was requested; nothing ran (or the fetch result was discarded).
    Stopped,
}

/// Shared cancellation and re-entrancy flags for one sync loop.
#[derive(Debug, Default)]
pub struct TickState {
    stop: AtomicBool,
    in_flight: AtomicBool,
}

impl TickState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cooperative shutdown; effective before the next tick.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// True while a tick holds the in-flight guard.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn begin_tick(&self) -> Option<TickGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| TickGuard { state: self })
    }
}

/// RAII release of the in-flight flag.
struct TickGuard<'state> {
    state: &'state TickState,
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Runs one guarded tick: fetch, reconcile, persist-if-changed, notify.
///
/// The testable unit of the sync loop; the scheduler thread and `sync_now`
/// both funnel through it. The observer is invoked after every completed
/// reconciliation, changed or not.
pub fn try_run_tick<R, S, F>(
    state: &TickState,
    store: &Mutex<QuoteStore<R>>,
    source: &S,
    on_reconciled: &mut F,
) -> TickOutcome
where
    R: SnapshotRepository,
    S: RemoteQuoteSource + ?Sized,
    F: FnMut(SyncReport) + ?Sized,
{
    if state.is_stopped() {
        return TickOutcome::Stopped;
    }
    let _guard = match state.begin_tick() {
        Some(guard) => guard,
        None => {
            warn!("event=sync_tick module=sync status=skipped reason=in_flight");
            return TickOutcome::SkippedBusy;
        }
    };

    // Fetch happens outside the store lock so store callers are not
    // blocked for the duration of a slow remote.
    let remote = match source.fetch_quotes() {
        Ok(remote) => remote,
        Err(err) => {
            warn!("event=sync_tick module=sync status=error stage=fetch error={err}");
            return TickOutcome::Failed(err.into());
        }
    };

    if state.is_stopped() {
        info!("event=sync_tick module=sync status=discarded reason=stopped");
        return TickOutcome::Stopped;
    }

    let report = {
        let mut store = match store.lock() {
            Ok(store) => store,
            Err(_) => {
                warn!("event=sync_tick module=sync status=error stage=lock error=poisoned");
                return TickOutcome::Failed(SyncError::StorePoisoned);
            }
        };

        let (merged, report) = reconcile(store.quotes(), &remote);
        if report.changed() {
            if let Err(err) = store.replace_all(merged) {
                warn!("event=sync_tick module=sync status=error stage=persist error={err}");
                return TickOutcome::Failed(err.into());
            }
        }
        report
    };

    let sync_report = SyncReport {
        changed: report.changed(),
        added: report.added,
        updated: report.updated,
    };
    info!(
        "event=sync_tick module=sync status=ok changed={} added={} updated={}",
        sync_report.changed, sync_report.added, sync_report.updated
    );
    on_reconciled(sync_report);
    TickOutcome::Completed(sync_report)
}

/// Timer-driven sync loop handle.
///
/// Owns a worker thread that runs an immediate first tick, then one tick
/// per interval. Dropping the handle stops the loop.
pub struct SyncScheduler {
    state: Arc<TickState>,
    tick: Arc<dyn Fn() -> TickOutcome + Send + Sync>,
    worker: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Starts the loop with an injected transport and observer callback.
    pub fn start<R, S, F>(
        interval: Duration,
        store: Arc<Mutex<QuoteStore<R>>>,
        source: S,
        on_reconciled: F,
    ) -> Self
    where
        R: SnapshotRepository + Send + 'static,
        S: RemoteQuoteSource + 'static,
        F: FnMut(SyncReport) + Send + 'static,
    {
        let state = Arc::new(TickState::new());
        let callback = Mutex::new(on_reconciled);

        let tick_state = Arc::clone(&state);
        let tick: Arc<dyn Fn() -> TickOutcome + Send + Sync> = Arc::new(move || {
            // The callback mutex is only taken at notify time, so a tick
            // skipped as busy never blocks on it.
            let mut notify = |report: SyncReport| {
                if let Ok(mut callback) = callback.lock() {
                    (callback)(report);
                }
            };
            try_run_tick(&tick_state, &store, &source, &mut notify)
        });

        let worker_state = Arc::clone(&state);
        let worker_tick = Arc::clone(&tick);
        let worker = std::thread::spawn(move || loop {
            if matches!(worker_tick(), TickOutcome::Stopped) {
                break;
            }
            if !sleep_with_cancel(&worker_state, interval) {
                break;
            }
        });

        info!(
            "event=sync_start module=sync status=ok interval_ms={}",
            interval.as_millis()
        );
        Self {
            state,
            tick,
            worker: Some(worker),
        }
    }

    /// Triggers an immediate tick, subject to the same busy/stop guards as
    /// timer ticks.
    pub fn sync_now(&self) -> TickOutcome {
        (self.tick)()
    }

    /// Stops the loop and waits for the worker to finish its current tick.
    pub fn stop(&mut self) {
        self.state.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            info!("event=sync_stop module=sync status=ok");
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sliced sleep so a stop request is honored promptly mid-interval.
/// Returns `false` when stop was requested.
fn sleep_with_cancel(state: &TickState, interval: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(10);
    let mut remaining = interval;
    while !remaining.is_zero() {
        if state.is_stopped() {
            return false;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !state.is_stopped()
}
