//! Subscriber-side handles.

use crate::slot::{SlotCloser, SlotReceiver, TryRecvError};
use crate::timeserver::Timeserver;
use futures::stream::{self, Stream};
use std::future::Future;
use tokio::sync::watch;

/// A capacity-1 coalescing view of a timeserver's stream.
///
/// Only the most recent undelivered timestamp is kept. Dropping or closing
/// the subscription tells the hub to forget it on its next round.
#[derive(Debug)]
pub struct Subscription {
    rx: SlotReceiver<f64>,
}

impl Subscription {
    pub(crate) fn new(rx: SlotReceiver<f64>) -> Self {
        Self { rx }
    }

    /// Waits for the next timestamp. `None` once the hub has shut down.
    pub async fn recv(&mut self) -> Option<f64> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<f64, TryRecvError> {
        self.rx.try_recv()
    }

    pub fn close(&mut self) {
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_closed()
    }

    /// Adapts the subscription into a [`Stream`] that ends with the hub.
    pub fn into_stream(self) -> impl Stream<Item = f64> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|time| (time, subscription))
        })
    }

    fn closer(&self) -> SlotCloser<f64> {
        self.rx.closer()
    }
}

struct ReleaseOnDrop(SlotCloser<f64>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Runs `f` with a fresh subscription to `hub` and closes it afterwards.
///
/// The subscription is released when `f` returns, fails, or when the
/// returned future is dropped before completing.
pub async fn with_subscription<F, Fut, R>(hub: &Timeserver, f: F) -> R
where
    F: FnOnce(Subscription) -> Fut,
    Fut: Future<Output = R>,
{
    let subscription = hub.subscribe();
    let _release = ReleaseOnDrop(subscription.closer());
    f(subscription).await
}

/// Watches a timeserver's control role.
///
/// The signal fires when the timeserver is closed or its loop stops for any
/// reason, including the upstream source running dry.
#[derive(Debug, Clone)]
pub struct ControlSignal {
    rx: watch::Receiver<bool>,
}

impl ControlSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_closed(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the control role has been closed.
    pub async fn closed(&mut self) {
        // An error means the hub and its sender are gone, which is closure too.
        let _ = self.rx.wait_for(|closed| *closed).await;
    }
}
