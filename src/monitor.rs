//! Periodic poll loop
//!
//! Each cycle fetches a snapshot, lets the alert engine decide what fires and
//! hands the resulting messages to the notification sink. The loop runs as a
//! tokio task that stops on an explicit signal; tests drive single cycles
//! through [`Monitor::run_once`].

use crate::alerts::{Alert, AlertEngine, NotificationSink};
use crate::collectors::Fetcher;
use crate::snapshot::{Category, EpochMillis, Snapshot};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Source of the current time
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current time as epoch milliseconds
    fn now_millis(&self) -> EpochMillis;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// Outcome of one poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Entity records in the fetched snapshot
    pub entities: usize,
    /// Alerts the engine fired
    pub fired: usize,
    /// Alerts the sink accepted
    pub delivered: usize,
    /// Alerts the sink rejected
    pub failed: usize,
    /// Failed alerts rearmed for the next cycle
    pub rearmed: usize,
}

/// Everything a single cycle needs, cheap to clone into the background task
#[derive(Clone)]
struct PollCycle {
    fetcher: Arc<Fetcher>,
    engine: Arc<Mutex<AlertEngine>>,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    redeliver_failed: bool,
}

impl PollCycle {
    async fn run(&self) -> CycleReport {
        let snapshot = self.fetcher.fetch().await;
        Self::warn_missing_categories(&snapshot);

        let mut report = CycleReport {
            entities: snapshot.entity_count(),
            ..CycleReport::default()
        };

        let now = self.clock.now_millis();
        let Some(alerts) = self.evaluate(&snapshot, now) else {
            return report;
        };
        report.fired = alerts.len();

        for alert in &alerts {
            match self.sink.send(alert.category, &alert.message).await {
                Ok(()) => {
                    report.delivered += 1;
                    info!(
                        "Sent {} alert for {} {}",
                        alert.label(),
                        alert.category,
                        alert.entity
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(
                        "Failed to send {} alert for {} {}: {}",
                        alert.label(),
                        alert.category,
                        alert.entity,
                        e
                    );
                    if self.redeliver_failed && self.rearm(alert) {
                        report.rearmed += 1;
                    }
                }
            }
        }

        report
    }

    /// Run the engine under its lock; `None` if the lock is poisoned
    fn evaluate(&self, snapshot: &Snapshot, now: EpochMillis) -> Option<Vec<Alert>> {
        match self.engine.lock() {
            Ok(mut engine) => Some(engine.evaluate(snapshot, now)),
            Err(_) => {
                error!("Alert engine lock poisoned, skipping evaluation");
                None
            }
        }
    }

    fn rearm(&self, alert: &Alert) -> bool {
        match self.engine.lock() {
            Ok(mut engine) => engine.rearm(alert),
            Err(_) => {
                error!("Alert engine lock poisoned, cannot rearm {}", alert.entity);
                false
            }
        }
    }

    fn warn_missing_categories(snapshot: &Snapshot) {
        for category in Category::ALL {
            match snapshot.category(category) {
                None => warn!("No {} data in snapshot", category.key()),
                Some(records) if records.is_empty() => {
                    warn!("Snapshot lists no {}", category.key())
                }
                Some(_) => {}
            }
        }
    }
}

/// Runs poll cycles on a fixed interval
pub struct Monitor {
    cycle: PollCycle,
    poll_interval: Duration,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl Monitor {
    /// Create a monitor using the wall clock, with failed alerts redelivered
    pub fn new(
        fetcher: Fetcher,
        engine: AlertEngine,
        sink: Arc<dyn NotificationSink>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            cycle: PollCycle {
                fetcher: Arc::new(fetcher),
                engine: Arc::new(Mutex::new(engine)),
                sink,
                clock: Arc::new(SystemClock),
                redeliver_failed: true,
            },
            poll_interval,
            shutdown_tx: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cycle.clock = clock;
        self
    }

    /// Whether an alert whose delivery failed fires again on the next cycle
    pub fn with_redelivery(mut self, enabled: bool) -> Self {
        self.cycle.redeliver_failed = enabled;
        self
    }

    /// Shared handle to the alert engine
    pub fn engine(&self) -> Arc<Mutex<AlertEngine>> {
        Arc::clone(&self.cycle.engine)
    }

    /// Run a single fetch-evaluate-notify cycle
    pub async fn run_once(&self) -> CycleReport {
        self.cycle.run().await
    }

    /// Spawn the background poll loop
    ///
    /// The first cycle runs immediately. Call [`Monitor::stop`] and await the
    /// returned handle to shut down; a cycle in progress is allowed to finish.
    pub fn start(&mut self) -> JoinHandle<()> {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let cycle = self.cycle.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            info!("Monitor started, polling every {:?}", poll_interval);
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = cycle.run().await;
                        debug!("Poll cycle finished: {:?}", report);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Monitor shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Signal the background loop to stop
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }
}
