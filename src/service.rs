//! Rectifier polling state machine
//!
//! Owns the connection lifecycle, runs the fixed-cadence read loop on one
//! background task, feeds successful readings to the journal and keeps a
//! concurrently readable snapshot. Failures are counted per cycle; past the
//! configured threshold the service forces a disconnect/reconnect and keeps
//! retrying every cycle until one succeeds.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::PollingConfig;
use crate::driver::RectifierDriver;
use crate::journal::CsvJournal;
use crate::types::{ConnectionState, Reading};

/// Latest and last-good reading slots, copied out under a brief lock
#[derive(Debug, Clone, Default)]
struct Snapshot {
    /// Most recent reading of any kind; may carry an error
    latest: Option<Reading>,
    /// Most recent error-free reading; survives outages until superseded
    last_good: Option<Reading>,
}

/// Polling state machine for one rectifier
#[derive(Debug)]
pub struct RectifierService {
    driver: Arc<RectifierDriver>,
    journal: Arc<CsvJournal>,
    interval: Duration,
    max_failures: u32,
    running: AtomicBool,
    fail_count: AtomicU32,
    state: RwLock<ConnectionState>,
    snapshot: RwLock<Snapshot>,
    /// Replaced with a fresh token on every start, so a stopped service can
    /// be started again
    cancel: Mutex<CancellationToken>,
}

impl RectifierService {
    pub fn new(
        driver: Arc<RectifierDriver>,
        journal: Arc<CsvJournal>,
        polling: &PollingConfig,
    ) -> Self {
        Self {
            driver,
            journal,
            interval: polling.interval,
            max_failures: polling.max_failures,
            running: AtomicBool::new(false),
            fail_count: AtomicU32::new(0),
            state: RwLock::new(ConnectionState::Disconnected),
            snapshot: RwLock::new(Snapshot::default()),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Start the service: one connection attempt, then the background
    /// polling task. Idempotent while running; a stopped service can be
    /// started again. A failed initial connect is not fatal, the loop starts
    /// regardless and recovers through the reconnect path.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("rectifier service starting");

        // Issue a fresh token; the one from a previous run stays cancelled
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) =
            CancellationToken::new();

        self.set_state(ConnectionState::Connecting);
        match self.driver.connect().await {
            Ok(()) => self.set_state(ConnectionState::Connected),
            Err(e) => {
                error!("initial connect failed: {e}");
                self.set_state(ConnectionState::Error);
            }
        }

        let service = Arc::clone(self);
        tokio::spawn(service.poll_loop());
    }

    /// Request a cooperative stop, honored at the next cycle boundary or
    /// sleep. Reads already in flight run to completion.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.cancel_token().cancel();
        info!("rectifier service stopping");
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last known good reading; `None` until one poll cycle has succeeded.
    /// Never returns an error-tagged reading.
    pub fn data(&self) -> Option<Reading> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last_good
            .clone()
    }

    /// Most recent reading regardless of outcome; may carry an error
    pub fn latest(&self) -> Option<Reading> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// Consecutive failure count since the last success or reconnect
    pub fn fail_count(&self) -> u32 {
        self.fail_count.load(Ordering::SeqCst)
    }

    /// Drift-free polling loop: the next scheduled instant advances by a
    /// fixed interval from the previous scheduled instant, so variable read
    /// latency does not accumulate. An overrunning cycle makes the next one
    /// run with zero sleep; no catch-up skipping.
    async fn poll_loop(self: Arc<Self>) {
        info!("polling loop started, interval {:?}", self.interval);

        let cancel = self.cancel_token();
        let mut next_poll = Instant::now();
        loop {
            if !self.is_running() || cancel.is_cancelled() {
                break;
            }

            self.run_cycle().await;

            next_poll += self.interval;
            if next_poll > Instant::now() {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = sleep_until(next_poll) => {}
                }
            }
        }

        info!("polling loop stopped");
    }

    /// One poll cycle: read, then take the success or failure path
    pub(crate) async fn run_cycle(&self) {
        // A lifecycle error (read while disconnected) is folded into the
        // same failure accounting as an error-tagged reading.
        let reading = match self.driver.read_reading().await {
            Ok(reading) => reading,
            Err(e) => Reading::failed(e.to_string()),
        };

        match reading.error.clone() {
            Some(err) => self.record_failure(reading, &err).await,
            None => self.record_success(reading),
        }
    }

    async fn record_failure(&self, reading: Reading, err: &str) {
        {
            let mut snapshot = self
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            snapshot.latest = Some(reading);
        }

        let failures = self.fail_count.fetch_add(1, Ordering::SeqCst) + 1;
        error!("polling failed ({failures}): {err}");

        if failures >= self.max_failures {
            self.set_state(ConnectionState::Error);
            self.driver.close().await;
            match self.driver.connect().await {
                Ok(()) => {
                    self.fail_count.store(0, Ordering::SeqCst);
                    self.set_state(ConnectionState::Connected);
                    info!("reconnected after {failures} consecutive failures");
                }
                // Count stays put, so every following cycle retries the
                // reconnect until one succeeds.
                Err(e) => error!("reconnect failed: {e}"),
            }
        }
    }

    fn record_success(&self, reading: Reading) {
        if let Err(e) = self.journal.write(&reading) {
            error!("journal write failed: {e}");
        }

        {
            let mut snapshot = self
                .snapshot
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            snapshot.latest = Some(reading.clone());
            snapshot.last_good = Some(reading);
        }

        self.fail_count.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
    }

    fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state != new_state {
            info!("state {} -> {}", *state, new_state);
            *state = new_state;
        }
    }
}
