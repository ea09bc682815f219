//! The broadcast hub.
//!
//! A [`Timeserver`] owns one upstream [`TimeSource`] and a single background
//! task that pulls from it and fans every value out to the current set of
//! subscribers. Delivery is non-blocking: each subscriber has a one-value
//! slot and a newer value overwrites an unread older one, so a slow or dead
//! reader can never hold the loop back.
//!
//! ## Roles
//!
//! * Ordinary subscribers come from [`Timeserver::subscribe`] and may be
//!   added at any time from any task. The loop is the only place that
//!   removes them, which it does when it finds their slot closed.
//! * The control role is a separate shutdown signal. Closing it (through
//!   [`Timeserver::close`] or by dropping the timeserver) ends the loop; the
//!   loop also raises it on the way out, so [`ControlSignal`] watchers learn
//!   about every termination, whatever its cause.
//!
//! ## Teardown
//!
//! Whatever ends the loop, it closes every remaining subscriber, raises the
//! control signal and then closes the upstream source, in that order.

use crate::error::TimeError;
use crate::slot::{slot, SlotSender};
use crate::source::TimeSource;
use crate::subscription::{ControlSignal, Subscription};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Value reported by [`Timeserver::current`] before the first upstream value arrives.
pub const NOT_YET_RECEIVED: f64 = -1.0;

/// Half the tick granularity of the reference remote clock, in seconds.
pub const DEFAULT_RESOLUTION_EPSILON: f64 = 0.01;

/// Why a hub loop stopped without failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubExit {
    /// The control role was closed.
    ControlClosed,
    /// The upstream source was exhausted or closed.
    SourceExhausted,
}

/// Tuning for a [`Timeserver`].
#[derive(Debug, Clone)]
pub struct TimeserverConfig {
    /// Name used in log output
    pub label: String,
    /// Sampling slack the delay primitive allows for, in seconds
    pub resolution_epsilon: f64,
}

impl Default for TimeserverConfig {
    fn default() -> Self {
        Self {
            label: "ut".to_string(),
            resolution_epsilon: DEFAULT_RESOLUTION_EPSILON,
        }
    }
}

/// `None` once the loop has exited and closed everyone.
type Registry = Arc<Mutex<Option<Vec<SlotSender<f64>>>>>;

/// Fan-out hub for one upstream time source.
#[derive(Debug)]
pub struct Timeserver {
    label: String,
    resolution_epsilon: f64,
    current: Arc<AtomicU64>,
    registry: Registry,
    control: Arc<watch::Sender<bool>>,
    task: Mutex<Option<JoinHandle<Result<HubExit, TimeError>>>>,
}

impl Timeserver {
    /// Wraps `source` with the default configuration and starts the loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<S: TimeSource>(source: S) -> Self {
        Self::with_config(source, TimeserverConfig::default())
    }

    pub fn with_config<S: TimeSource>(source: S, config: TimeserverConfig) -> Self {
        let current = Arc::new(AtomicU64::new(NOT_YET_RECEIVED.to_bits()));
        let registry: Registry = Arc::new(Mutex::new(Some(Vec::new())));
        let (control, control_rx) = watch::channel(false);
        let control = Arc::new(control);

        let task = tokio::spawn(run_hub(
            source,
            config.label.clone(),
            current.clone(),
            registry.clone(),
            control.clone(),
            control_rx,
        ));
        debug!(timeserver = %config.label, "⏱️ Timeserver started");

        Self {
            label: config.label,
            resolution_epsilon: config.resolution_epsilon,
            current,
            registry,
            control,
            task: Mutex::new(Some(task)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn resolution_epsilon(&self) -> f64 {
        self.resolution_epsilon
    }

    /// Latest upstream value, or [`NOT_YET_RECEIVED`]. Not necessarily fresh.
    pub fn current(&self) -> f64 {
        f64::from_bits(self.current.load(Ordering::Acquire))
    }

    /// Latest upstream value, if one has arrived.
    pub fn latest(&self) -> Option<f64> {
        let bits = self.current.load(Ordering::Acquire);
        (bits != NOT_YET_RECEIVED.to_bits()).then(|| f64::from_bits(bits))
    }

    /// Registers a new subscriber.
    ///
    /// The subscriber takes part from the next delivery round onward. After
    /// the hub has shut down the returned subscription is already closed.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = slot();
        match self.registry.lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(subscribers) => subscribers.push(tx),
                None => {
                    tx.close();
                }
            },
            Err(_) => {
                warn!(timeserver = %self.label, "Subscriber registry poisoned; handing out a closed subscription");
                tx.close();
            }
        }
        Subscription::new(rx)
    }

    /// Handle that fires when this timeserver shuts down.
    pub fn control_signal(&self) -> ControlSignal {
        ControlSignal::new(self.control.subscribe())
    }

    /// Number of subscribers the loop will deliver to next round.
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn is_running(&self) -> bool {
        !*self.control.borrow()
    }

    /// Closes the control role, ending the loop. Safe to call repeatedly.
    pub fn close(&self) {
        let was_closed = self.control.send_replace(true);
        if !was_closed {
            debug!(timeserver = %self.label, "🛑 Timeserver close requested");
        }
    }

    /// Waits for the loop to finish and reports how it ended.
    pub async fn join(&self) -> Result<HubExit, TimeError> {
        let task = self
            .task
            .lock()
            .map_err(|_| TimeError::AlreadyJoined)?
            .take()
            .ok_or(TimeError::AlreadyJoined)?;
        task.await.map_err(|e| TimeError::Join(e.to_string()))?
    }

    /// Closes the timeserver and waits for its loop to finish.
    pub async fn shutdown(&self) -> Result<HubExit, TimeError> {
        self.close();
        self.join().await
    }
}

impl Drop for Timeserver {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_hub<S: TimeSource>(
    mut source: S,
    label: String,
    current: Arc<AtomicU64>,
    registry: Registry,
    control: Arc<watch::Sender<bool>>,
    mut control_rx: watch::Receiver<bool>,
) -> Result<HubExit, TimeError> {
    let outcome = pump(&mut source, &current, &registry, &mut control_rx).await;

    let closed = close_all(&registry);
    control.send_replace(true);
    source.close();

    match &outcome {
        Ok(exit) => info!(timeserver = %label, ?exit, closed, "⏹️ Timeserver stopped"),
        Err(e) => error!(timeserver = %label, closed, "❌ Timeserver terminated abnormally: {}", e),
    }
    outcome
}

async fn pump<S: TimeSource>(
    source: &mut S,
    current: &AtomicU64,
    registry: &Registry,
    control: &mut watch::Receiver<bool>,
) -> Result<HubExit, TimeError> {
    loop {
        if *control.borrow() {
            return Ok(HubExit::ControlClosed);
        }

        let next = tokio::select! {
            biased;
            changed = control.changed() => {
                if changed.is_err() || *control.borrow() {
                    return Ok(HubExit::ControlClosed);
                }
                continue;
            }
            next = source.next() => next?,
        };
        let Some(time) = next else {
            return Ok(HubExit::SourceExhausted);
        };

        current.store(time.to_bits(), Ordering::Release);
        if *control.borrow() {
            return Ok(HubExit::ControlClosed);
        }
        fan_out(registry, time)?;
    }
}

/// Delivers `time` to every subscriber, dropping the ones that have closed.
///
/// Survivors keep their relative order. Returns how many were dropped.
fn fan_out(registry: &Registry, time: f64) -> Result<usize, TimeError> {
    let mut guard = registry.lock().map_err(|_| TimeError::RegistryPoisoned)?;
    let Some(subscribers) = guard.as_mut() else {
        return Ok(0);
    };

    let before = subscribers.len();
    subscribers.retain(|subscriber| subscriber.replace(time).is_ok());
    let removed = before - subscribers.len();
    if removed > 0 {
        debug!(removed, remaining = subscribers.len(), "Dropped closed subscribers");
    }
    Ok(removed)
}

fn close_all(registry: &Registry) -> usize {
    let mut guard = registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let subscribers = guard.take().unwrap_or_default();
    subscribers
        .iter()
        .filter(|subscriber| subscriber.close())
        .count()
}
