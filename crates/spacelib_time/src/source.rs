//! Upstream time sources.
//!
//! A [`TimeSource`] yields successive timestamps (seconds, `f64`) and can be
//! closed. The hub pulls from exactly one source.
//!
//! * [`SyntheticClock`] samples the local wall clock at a fixed period. It is
//!   the stand-in for the game clock when testing.
//! * [`StreamSource`] yields whatever its paired [`StreamFeed`] pushes, which
//!   is how a remote value stream is plugged in.

use crate::error::TimeError;
use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Producer of successive timestamps.
#[async_trait]
pub trait TimeSource: Send + 'static {
    /// Waits for the next value. `Ok(None)` means the source is exhausted or closed.
    async fn next(&mut self) -> Result<Option<f64>, TimeError>;

    /// Stops the source. Must be idempotent.
    fn close(&mut self);
}

#[async_trait]
impl TimeSource for Box<dyn TimeSource> {
    async fn next(&mut self) -> Result<Option<f64>, TimeError> {
        (**self).next().await
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Wall-clock sampler ticking every `period`.
#[derive(Debug)]
pub struct SyntheticClock {
    period: Duration,
    interval: Option<Interval>,
    closed: bool,
}

impl SyntheticClock {
    /// Tick period used when none is configured.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(5);

    pub fn new(period: Duration) -> Result<Self, TimeError> {
        if period.is_zero() {
            return Err(TimeError::InvalidPeriod(period));
        }
        Ok(Self {
            period,
            interval: None,
            closed: false,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn wall_clock() -> Result<f64, TimeError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| since_epoch.as_secs_f64())
            .map_err(|e| TimeError::Clock(e.to_string()))
    }
}

impl Default for SyntheticClock {
    fn default() -> Self {
        Self {
            period: Self::DEFAULT_PERIOD,
            interval: None,
            closed: false,
        }
    }
}

#[async_trait]
impl TimeSource for SyntheticClock {
    async fn next(&mut self) -> Result<Option<f64>, TimeError> {
        if self.closed {
            return Ok(None);
        }
        // Created on first use so construction does not need a running runtime.
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
        Self::wall_clock().map(Some)
    }

    fn close(&mut self) {
        self.closed = true;
        self.interval = None;
    }
}

/// Creates a pushed source and the feed that drives it.
///
/// `capacity` bounds how many pushed values may queue before the hub reads them.
pub fn stream_source(capacity: usize) -> (StreamFeed, StreamSource) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        StreamFeed { tx },
        StreamSource {
            rx,
            closed: false,
        },
    )
}

/// Pushing half of a [`StreamSource`]. Dropping every feed exhausts the source.
#[derive(Debug, Clone)]
pub struct StreamFeed {
    tx: mpsc::Sender<f64>,
}

impl StreamFeed {
    /// Pushes a value, waiting while the queue is full.
    pub async fn push(&self, time: f64) -> Result<(), TimeError> {
        self.tx.send(time).await.map_err(|_| TimeError::FeedClosed)
    }

    /// Pushes a value if there is room. Returns `Ok(false)` when the value was dropped.
    pub fn try_push(&self, time: f64) -> Result<bool, TimeError> {
        match self.tx.try_send(time) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TimeError::FeedClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the source side has been closed or dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Source fed by a [`StreamFeed`], typically bridged from a remote stream.
#[derive(Debug)]
pub struct StreamSource {
    rx: mpsc::Receiver<f64>,
    closed: bool,
}

#[async_trait]
impl TimeSource for StreamSource {
    async fn next(&mut self) -> Result<Option<f64>, TimeError> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.rx.recv().await)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.rx.close();
        }
    }
}
