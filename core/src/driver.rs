//! Async host loop around [`PipelineState`].
//!
//! One task owns the state. It wakes on inbound events or on the resolver's
//! refresh deadline, folds queued sensor batches into the newest one and
//! publishes a fresh [`PipelineSnapshot`] after every wake-up.

use std::future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::interface::Timestamp;
use crate::pipeline::{PipelineEvent, PipelineSnapshot, PipelineState};
use crate::prelude::{StageError, StageResult};
use crate::telemetry::log::LogManager;

/// Maps the tokio clock onto wall-clock seconds.
#[derive(Debug, Clone, Copy)]
pub struct DriverClock {
    base: Timestamp,
    start: Instant,
}

impl DriverClock {
    pub fn starting_at(base: Timestamp) -> Self {
        Self {
            base,
            start: Instant::now(),
        }
    }

    pub fn system() -> Self {
        let base = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        Self::starting_at(base)
    }

    pub fn now(&self) -> Timestamp {
        self.base + self.start.elapsed().as_secs_f64()
    }

    fn instant_at(&self, at: Timestamp) -> Instant {
        let offset = at - self.base;
        if offset.is_finite() && offset > 0.0 {
            self.start + Duration::from_secs_f64(offset)
        } else {
            self.start
        }
    }
}

/// Keeps only the newest sensor batch of a queued run.
///
/// Other events keep their relative order. Returns the surviving events and
/// how many sensor batches were superseded.
pub fn coalesce(events: Vec<PipelineEvent>) -> (Vec<PipelineEvent>, usize) {
    let latest = events
        .iter()
        .rposition(|event| matches!(event, PipelineEvent::SensorUpdate(_)));
    let Some(latest) = latest else {
        return (events, 0);
    };

    let mut superseded = 0;
    let kept = events
        .into_iter()
        .enumerate()
        .filter_map(|(slot, event)| match event {
            PipelineEvent::SensorUpdate(_) if slot != latest => {
                superseded += 1;
                None
            }
            event => Some(event),
        })
        .collect();
    (kept, superseded)
}

/// Sending side of a running driver.
pub struct DriverHandle {
    events: mpsc::Sender<PipelineEvent>,
    snapshots: watch::Receiver<PipelineSnapshot>,
    task: JoinHandle<PipelineSnapshot>,
}

impl DriverHandle {
    pub async fn send(&self, event: PipelineEvent) -> StageResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| StageError::Internal("pipeline driver has stopped".into()))
    }

    pub fn try_send(&self, event: PipelineEvent) -> StageResult<()> {
        self.events.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                StageError::BufferExhaustion("pipeline event queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => {
                StageError::Internal("pipeline driver has stopped".into())
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.clone()
    }

    pub fn latest(&self) -> PipelineSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Closes the event queue and waits for the loop to finish its backlog.
    pub async fn shutdown(self) -> StageResult<PipelineSnapshot> {
        let DriverHandle { events, task, .. } = self;
        drop(events);
        task.await
            .map_err(|err| StageError::Internal(format!("pipeline driver failed: {}", err)))
    }
}

/// Spawns the driver on the current tokio runtime.
pub fn spawn(state: PipelineState, clock: DriverClock, capacity: usize) -> DriverHandle {
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (snapshots_tx, snapshots_rx) = watch::channel(state.snapshot());
    let task = tokio::spawn(run(state, events_rx, snapshots_tx, clock));
    DriverHandle {
        events: events_tx,
        snapshots: snapshots_rx,
        task,
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn run(
    mut state: PipelineState,
    mut events: mpsc::Receiver<PipelineEvent>,
    snapshots: watch::Sender<PipelineSnapshot>,
    clock: DriverClock,
) -> PipelineSnapshot {
    let logger = LogManager::new("driver");
    let metrics = state.metrics();
    logger.record("pipeline driver started");

    loop {
        let due = state.next_refresh_due();
        let deadline = due.map(|due| clock.instant_at(due));

        let mut batch = Vec::new();
        let mut timer_floor = None;
        tokio::select! {
            received = events.recv() => match received {
                Some(event) => batch.push(event),
                None => break,
            },
            _ = wait_for(deadline) => {
                batch.push(PipelineEvent::RefreshTimer);
                timer_floor = due;
            }
        }
        while let Ok(event) = events.try_recv() {
            batch.push(event);
        }

        let (batch, superseded) = coalesce(batch);
        if superseded > 0 {
            metrics.record_superseded(superseded);
            logger.debug(&format!("skipped {} superseded sensor batches", superseded));
        }

        for event in batch {
            let mut now = clock.now();
            if matches!(event, PipelineEvent::RefreshTimer) {
                // Never report the firing as earlier than its deadline.
                now = timer_floor.map_or(now, |floor| now.max(floor));
            }
            let kind = event.kind();
            if let Err(err) = state.apply(event, now) {
                logger.warn(&format!("{} event failed: {}", kind, err));
            }
        }
        snapshots.send_replace(state.snapshot());
    }

    logger.record("pipeline driver stopped");
    state.snapshot()
}
