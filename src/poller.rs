//! ==============================================================================
//! poller.rs - periodic refresh of the display state
//! ==============================================================================
//!
//! purpose:
//!     keeps the DisplayState current by pulling the device log on a timer.
//!
//! lifecycle:
//!
//! ```text
//!     Poller::new ──activate()──► PollerHandle ──deactivate() / drop──► stopped
//!                                     │
//!                     ┌───────────────┴───────────────┐
//!                     │  Idle ──tick──► Refreshing ─┐ │
//!                     │   ▲                         │ │
//!                     │   └─────────────────────────┘ │
//!                     └───────────────────────────────┘
//!
//!     the first refresh runs immediately on activation. a single task
//!     drives every refresh, so refreshes never overlap.
//! ```
//!
//! failure policy:
//!     fetch errors and empty cycles are logged and skipped; the last good
//!     DisplayState stays up. deactivation abandons a request in flight, and
//!     a result that races the stop signal is dropped instead of published.
//!
//! relationships:
//!     - reads: source.rs (RecordSource)
//!     - uses: pipeline.rs (extract_records, select_latest)
//!     - writes: domain.rs (DisplayStore)
//!
//! ==============================================================================

use crate::domain::{DisplayStore, DEFAULT_MAX_ROWS};
use crate::error::RefreshError;
use crate::pipeline::{extract_records, select_latest, Extracted};
use crate::source::RecordSource;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// observable poller state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollerState {
    /// timer armed, no request in flight
    Idle,
    /// request in flight
    Refreshing,
    /// deactivated, no further refreshes
    Stopped,
}

/// what a single refresh did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// display state replaced
    Published { rows: usize, rejected: usize },
    /// nothing usable came back; display state untouched
    Empty { rejected: usize },
    /// the poller was deactivated while the request was in flight
    Discarded,
}

/// does the actual work of one cycle
struct Refresher {
    source: Arc<dyn RecordSource>,
    store: DisplayStore,
    max_rows: usize,
    show_sensor_data: bool,
    stopped: watch::Receiver<bool>,
}

/// a configured, not yet running poller
pub struct Poller {
    refresher: Refresher,
    stop_tx: watch::Sender<bool>,
}

/// the running refresh timer.
///
/// owning the handle owns the timer: dropping it cancels future refreshes
/// even when `deactivate` is never reached.
pub struct PollerHandle {
    stop_tx: watch::Sender<bool>,
    state: watch::Receiver<PollerState>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn new(source: Arc<dyn RecordSource>, store: DisplayStore) -> Self {
        let (stop_tx, stopped) = watch::channel(false);
        Self {
            refresher: Refresher {
                source,
                store,
                max_rows: DEFAULT_MAX_ROWS,
                show_sensor_data: false,
                stopped,
            },
            stop_tx,
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.refresher.max_rows = max_rows;
        self
    }

    /// log every published row at info
    pub fn with_row_logging(mut self, enabled: bool) -> Self {
        self.refresher.show_sensor_data = enabled;
        self
    }

    /// run one cycle now, outside the timer
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        self.refresher.refresh().await
    }

    /// start refreshing: once now, then every `interval`
    pub fn activate(self, interval: Duration) -> PollerHandle {
        let Poller { refresher, stop_tx } = self;
        let (state_tx, state) = watch::channel(PollerState::Idle);

        info!(
            source = %refresher.source.describe(),
            interval_ms = interval.as_millis() as u64,
            "poller activated"
        );
        let task = tokio::spawn(refresher.run(interval, state_tx));

        PollerHandle {
            stop_tx,
            state,
            task: Some(task),
        }
    }
}

impl PollerHandle {
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// stop the timer and wait for the task to wind down.
    ///
    /// a request in flight is abandoned, so a stalled store cannot hold
    /// this up. its result is never published.
    pub async fn deactivate(mut self) {
        self.stop_tx.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("poller task ended abnormally: {}", e);
            }
        }
        info!("poller deactivated");
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
    }
}

impl Refresher {
    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    async fn run(self, interval: Duration, state_tx: watch::Sender<PollerState>) {
        // tokio rejects a zero period
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stop_signal = self.stopped.clone();

        loop {
            // first tick completes immediately
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop_signal.changed() => {}
            }
            if self.is_stopped() {
                break;
            }

            state_tx.send_replace(PollerState::Refreshing);
            let result = tokio::select! {
                result = self.refresh() => result,
                _ = stop_signal.changed() => {
                    debug!("poller stopped while request was in flight, abandoning it");
                    break;
                }
            };
            match result {
                Ok(RefreshOutcome::Published { rows, rejected }) => {
                    debug!(rows, rejected, "display state published");
                }
                Ok(RefreshOutcome::Empty { rejected }) => {
                    debug!(rejected, "no data this cycle, keeping previous rows");
                }
                Ok(RefreshOutcome::Discarded) => {}
                Err(e) => {
                    warn!("⚠ refresh failed, keeping previous rows: {}", e);
                }
            }
            state_tx.send_replace(PollerState::Idle);
        }

        state_tx.send_replace(PollerState::Stopped);
    }

    async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let document = match self.source.fetch().await? {
            Some(document) => document,
            None => return Ok(RefreshOutcome::Empty { rejected: 0 }),
        };

        let Extracted { records, rejections } = extract_records(document);
        for (key, reason) in &rejections {
            warn!(key = %key, "skipping record: {}", reason);
        }
        let rejected = rejections.len();

        if records.is_empty() {
            return Ok(RefreshOutcome::Empty { rejected });
        }

        let latest = select_latest(records, self.max_rows);
        let rows = latest.len();

        if self.show_sensor_data && !self.is_stopped() {
            for r in &latest {
                info!(
                    timestamp = r.timestamp.raw(),
                    temperature = ?r.temperature,
                    tds = ?r.tds,
                    ph = ?r.ph,
                    orp = ?r.orp,
                    "reading"
                );
            }
        }

        // checked under the write lock, so a stop can't slip in before the write
        if !self.store.replace_if(latest, || !self.is_stopped()).await {
            debug!("poller stopped before publish, dropping result");
            return Ok(RefreshOutcome::Discarded);
        }
        Ok(RefreshOutcome::Published { rows, rejected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DisplayState;
    use crate::error::FetchFailure;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type Response = Result<Option<Value>, FetchFailure>;

    /// replays canned responses, then reports "no data"
    struct ScriptedSource {
        responses: Mutex<VecDeque<Response>>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Response>) -> Arc<Self> {
            Self::delayed(responses, Duration::ZERO)
        }

        fn delayed(responses: Vec<Response>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn fetch(&self) -> Result<Option<Value>, FetchFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.responses.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn row(ts: &str, temperature: f64) -> Value {
        json!({
            "timestamp": ts,
            "temperature": temperature,
            "tds": 400.0,
            "ph": 7.5,
            "orp": 230.0,
        })
    }

    fn three_rows() -> Value {
        json!({
            "a": row("2025-12-27 14:55:00", 27.0),
            "c": row("2025-12-27 14:55:20", 29.0),
            "b": row("2025-12-27 14:55:10", 28.0),
        })
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_refresh_publishes_newest_first() {
        let store = DisplayStore::new();
        let source = ScriptedSource::new(vec![Ok(Some(three_rows()))]);
        let poller = Poller::new(source, store.clone());

        let outcome = poller.refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Published { rows: 3, rejected: 0 });

        let state = store.snapshot().await;
        let temps: Vec<Option<f64>> = state.records.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![Some(29.0), Some(28.0), Some(27.0)]);
    }

    #[tokio::test]
    async fn test_empty_and_failed_cycles_keep_previous_rows() {
        let store = DisplayStore::new();
        let source = ScriptedSource::new(vec![
            Ok(Some(three_rows())),
            Ok(None),
            Err(FetchFailure::Status { status: 500 }),
            Ok(Some(json!({}))),
        ]);
        let poller = Poller::new(source, store.clone());

        poller.refresh().await.unwrap();
        let before = store.snapshot().await;

        let empty = RefreshOutcome::Empty { rejected: 0 };
        assert_eq!(poller.refresh().await.unwrap(), empty);
        assert!(matches!(
            poller.refresh().await,
            Err(RefreshError::Fetch(FetchFailure::Status { status: 500 }))
        ));
        assert_eq!(poller.refresh().await.unwrap(), empty);

        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_all_rejected_is_empty() {
        let store = DisplayStore::new();
        let doc = json!({
            "x": { "timestamp": "not a time", "temperature": 1, "tds": 1, "ph": 1, "orp": 1 }
        });
        let poller = Poller::new(ScriptedSource::new(vec![Ok(Some(doc))]), store.clone());

        let outcome = poller.refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Empty { rejected: 1 });
        assert!(store.snapshot().await.records.is_empty());
    }

    #[tokio::test]
    async fn test_max_rows_is_honoured() {
        let store = DisplayStore::new();
        let source = ScriptedSource::new(vec![Ok(Some(three_rows()))]);
        let poller = Poller::new(source, store.clone()).with_max_rows(2);

        let outcome = poller.refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Published { rows: 2, rejected: 0 });
        assert_eq!(store.snapshot().await.records[0].temperature, Some(29.0));
    }

    #[tokio::test]
    async fn test_refresh_after_stop_is_discarded() {
        let store = DisplayStore::new();
        let source = ScriptedSource::new(vec![Ok(Some(three_rows()))]);
        let poller = Poller::new(source, store.clone());

        poller.stop_tx.send_replace(true);
        assert_eq!(poller.refresh().await.unwrap(), RefreshOutcome::Discarded);
        assert_eq!(store.snapshot().await, DisplayState::default());
    }

    #[tokio::test]
    async fn test_activation_refreshes_immediately() {
        let store = DisplayStore::new();
        let source = ScriptedSource::new(vec![Ok(Some(three_rows()))]);
        let handle = Poller::new(source.clone(), store.clone()).activate(Duration::from_secs(3600));

        wait_until(|| source.calls() == 1).await;
        wait_until(|| handle.state() == PollerState::Idle).await;
        handle.deactivate().await;

        assert_eq!(store.snapshot().await.records.len(), 3);
    }

    #[tokio::test]
    async fn test_deactivate_stops_further_requests() {
        let source = ScriptedSource::new(vec![]);
        let poller = Poller::new(source.clone(), DisplayStore::new());
        let handle = poller.activate(Duration::from_millis(10));

        wait_until(|| source.calls() >= 3).await;
        handle.deactivate().await;
        let calls = source.calls();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_timer() {
        let source = ScriptedSource::new(vec![]);
        let poller = Poller::new(source.clone(), DisplayStore::new());
        let handle = poller.activate(Duration::from_millis(10));

        wait_until(|| source.calls() >= 2).await;
        drop(handle);
        // let the task observe the stop signal
        tokio::time::sleep(Duration::from_millis(30)).await;
        let calls = source.calls();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test]
    async fn test_late_result_after_deactivate_is_dropped() {
        let store = DisplayStore::new();
        let delay = Duration::from_millis(150);
        let source = ScriptedSource::delayed(vec![Ok(Some(three_rows()))], delay);
        let handle = Poller::new(source.clone(), store.clone()).activate(Duration::from_secs(3600));

        wait_until(|| source.calls() == 1).await;
        assert_eq!(handle.state(), PollerState::Refreshing);
        handle.deactivate().await;

        // give the abandoned request time to have finished, had it kept running
        tokio::time::sleep(Duration::from_millis(200)).await;
        let state = store.snapshot().await;
        assert!(state.records.is_empty());
        assert_eq!(state.last_update_ms, None);
    }

    #[tokio::test]
    async fn test_deactivate_does_not_wait_for_stalled_store() {
        let source = ScriptedSource::delayed(vec![], Duration::from_secs(3600));
        let poller = Poller::new(source.clone(), DisplayStore::new());
        let handle = poller.activate(Duration::from_secs(3600));

        wait_until(|| source.calls() == 1).await;
        let finished = tokio::time::timeout(Duration::from_secs(2), handle.deactivate()).await;
        assert!(finished.is_ok(), "deactivate blocked on an in-flight request");
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let source = ScriptedSource::delayed(vec![], Duration::from_millis(50));
        let poller = Poller::new(source.clone(), DisplayStore::new());
        let handle = poller.activate(Duration::from_secs(3600));

        wait_until(|| source.calls() == 1).await;
        assert_eq!(handle.state(), PollerState::Refreshing);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(handle.state(), PollerState::Idle);

        let state = handle.state.clone();
        handle.deactivate().await;
        assert_eq!(*state.borrow(), PollerState::Stopped);
    }
}
