//! Derived periodic streams.

use crate::slot::slot;
use crate::subscription::Subscription;
use crate::timeserver::Timeserver;
use tracing::trace;

/// Re-emits `hub`'s stream at most once per `min_gap` seconds.
///
/// A value is forwarded only when it is more than `min_gap` past the last
/// forwarded value and the returned subscription has no unread value, so a
/// consumer that falls behind never finds stale work queued up. The first
/// value received is always eligible.
///
/// Closing or dropping the returned subscription stops the forwarding task
/// and releases its own subscription to `hub`. The stream also ends when the
/// hub shuts down.
pub fn periodic_subscription(hub: &Timeserver, min_gap: f64) -> Subscription {
    let mut primary = hub.subscribe();
    let (tx, rx) = slot();

    tokio::spawn(async move {
        let mut last_emitted = f64::NEG_INFINITY;
        loop {
            let time = tokio::select! {
                _ = tx.closed() => break,
                time = primary.recv() => match time {
                    Some(time) => time,
                    None => break,
                },
            };
            if time - last_emitted > min_gap && tx.offer(time).is_ok() {
                trace!(time, min_gap, "Periodic tick");
                last_emitted = time;
            }
        }
        primary.close();
        tx.close();
    });

    Subscription::new(rx)
}
