//! Blocking "wait until N seconds of stream time have passed".

use crate::error::TimeError;
use crate::subscription::with_subscription;
use crate::timeserver::Timeserver;
use std::future::{self, Future};
use tracing::{debug, info, warn};

/// Start and end timestamps observed by a delay.
///
/// `end - start` may differ slightly from the requested duration because the
/// stream is sampled discretely.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySpan {
    pub start: f64,
    pub end: f64,
    /// Set when the wait was cut short by an interrupt
    pub interrupted: bool,
    /// Set when the hub stopped before the requested time passed
    pub ended: bool,
}

impl DelaySpan {
    pub fn elapsed(&self) -> f64 {
        self.end - self.start
    }
}

/// Waits until `seconds` of stream time have elapsed on `hub`.
///
/// Returns once the observed elapsed time reaches `seconds` minus the hub's
/// resolution epsilon. If the hub shuts down first the span is returned early
/// with [`DelaySpan::ended`] set.
pub async fn delay(hub: &Timeserver, seconds: f64) -> Result<DelaySpan, TimeError> {
    delay_or_interrupt(hub, seconds, future::pending::<()>()).await
}

/// Like [`delay`], but gives up early when `interrupt` completes.
///
/// An interrupt is not an error: it is logged and the timestamps observed so
/// far are returned with [`DelaySpan::interrupted`] set. If nothing has been
/// observed yet, both timestamps are the hub's last known value.
pub async fn delay_or_interrupt<I>(
    hub: &Timeserver,
    seconds: f64,
    interrupt: I,
) -> Result<DelaySpan, TimeError>
where
    I: Future<Output = ()>,
{
    let threshold = seconds - hub.resolution_epsilon();
    let initial = hub.latest();
    let fallback = hub.current();

    let span = with_subscription(hub, |mut subscription| async move {
        tokio::pin!(interrupt);
        let mut start = initial;
        let mut end = initial;
        loop {
            let next = tokio::select! {
                _ = &mut interrupt => {
                    let start = start.unwrap_or(fallback);
                    let end = end.unwrap_or(start);
                    warn!(start, end, seconds, "⚠️ Delay interrupted");
                    return Ok(DelaySpan { start, end, interrupted: true, ended: false });
                }
                next = subscription.recv() => next,
            };
            let Some(time) = next else {
                let start = start.unwrap_or(fallback);
                let end = end.unwrap_or(start);
                info!(start, end, seconds, "Time stream ended during delay");
                return Ok(DelaySpan { start, end, interrupted: false, ended: true });
            };
            let begun = *start.get_or_insert(time);
            end = Some(time);
            if time - begun >= threshold {
                return Ok(DelaySpan {
                    start: begun,
                    end: time,
                    interrupted: false,
                    ended: false,
                });
            }
        }
    })
    .await?;

    debug!(
        requested = seconds,
        elapsed = span.elapsed(),
        "Delay complete"
    );
    Ok(span)
}
