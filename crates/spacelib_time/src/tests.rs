// Hub-level behaviour: fan-out, removal, shutdown.

use crate::*;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

/// Stream source that counts how often it is closed.
struct CountingSource {
    inner: StreamSource,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl TimeSource for CountingSource {
    async fn next(&mut self) -> Result<Option<f64>, TimeError> {
        self.inner.next().await
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close();
    }
}

/// Yields one value, then fails.
struct FailingSource {
    served: bool,
}

#[async_trait]
impl TimeSource for FailingSource {
    async fn next(&mut self) -> Result<Option<f64>, TimeError> {
        if self.served {
            tokio::time::sleep(Duration::from_millis(10)).await;
            return Err(TimeError::Source("remote stream reset".to_string()));
        }
        self.served = true;
        Ok(Some(5.0))
    }

    fn close(&mut self) {}
}

async fn recv_within(subscription: &mut Subscription) -> Option<f64> {
    tokio::time::timeout(WAIT, subscription.recv())
        .await
        .expect("subscription should yield or end in time")
}

#[tokio::test(flavor = "multi_thread")]
async fn current_starts_at_sentinel() {
    let (feed, source) = stream_source(1);
    let hub = Timeserver::new(source);
    assert_eq!(hub.current(), NOT_YET_RECEIVED);
    assert_eq!(hub.latest(), None);

    let mut watcher = hub.subscribe();
    feed.push(42.5).await.unwrap();
    assert_eq!(recv_within(&mut watcher).await, Some(42.5));
    assert_eq!(hub.current(), 42.5);
    assert_eq!(hub.latest(), Some(42.5));
    hub.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn unread_subscriber_keeps_only_latest_value() {
    let (feed, source) = stream_source(4);
    let hub = Timeserver::new(source);
    let mut lazy = hub.subscribe();
    let mut watcher = hub.subscribe();

    feed.push(1.0).await.unwrap();
    assert_eq!(recv_within(&mut watcher).await, Some(1.0));
    feed.push(2.0).await.unwrap();
    // The watcher is behind `lazy` in delivery order, so `lazy` already holds 2.0.
    assert_eq!(recv_within(&mut watcher).await, Some(2.0));

    assert_eq!(lazy.try_recv(), Ok(2.0));
    assert_eq!(lazy.try_recv(), Err(TryRecvError::Empty));
    hub.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn unread_subscribers_do_not_stall_delivery() {
    let (feed, source) = stream_source(16);
    let hub = Timeserver::new(source);
    let _idle: Vec<Subscription> = (0..64).map(|_| hub.subscribe()).collect();
    let mut active = hub.subscribe();

    let reader = tokio::spawn(async move {
        while let Some(time) = active.recv().await {
            if time == 199.0 {
                return true;
            }
        }
        false
    });
    for step in 0..200 {
        feed.push(step as f64).await.unwrap();
    }

    let reached_end = tokio::time::timeout(WAIT, reader)
        .await
        .expect("delivery must not stall on idle subscribers")
        .expect("reader task");
    assert!(reached_end);
    assert_eq!(hub.subscriber_count(), 65);
    hub.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn closed_subscriber_is_dropped_without_disturbing_others() {
    let (feed, source) = stream_source(1);
    let hub = Timeserver::new(source);
    let mut first = hub.subscribe();
    let mut middle = hub.subscribe();
    let mut last = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 3);

    middle.close();
    feed.push(1.0).await.unwrap();
    assert_eq!(recv_within(&mut first).await, Some(1.0));
    assert_eq!(recv_within(&mut last).await, Some(1.0));
    assert_eq!(hub.subscriber_count(), 2);
    assert!(hub.is_running());

    feed.push(2.0).await.unwrap();
    assert_eq!(recv_within(&mut first).await, Some(2.0));
    assert_eq!(recv_within(&mut last).await, Some(2.0));
    hub.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn several_closures_in_one_round_keep_survivors() {
    let (feed, source) = stream_source(1);
    let hub = Timeserver::new(source);
    let mut subscriptions: Vec<Subscription> = (0..5).map(|_| hub.subscribe()).collect();

    subscriptions[1].close();
    subscriptions[3].close();
    drop(subscriptions.remove(4));
    feed.push(7.0).await.unwrap();

    for index in [0, 2] {
        assert_eq!(recv_within(&mut subscriptions[index]).await, Some(7.0));
    }
    assert_eq!(hub.subscriber_count(), 2);
    hub.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn closing_control_closes_subscribers_and_source_once() {
    let (feed, inner) = stream_source(1);
    let closes = Arc::new(AtomicUsize::new(0));
    let hub = Timeserver::new(CountingSource {
        inner,
        closes: closes.clone(),
    });
    let mut reader = hub.subscribe();
    let mut idle = hub.subscribe();
    let control = hub.control_signal();

    feed.push(3.0).await.unwrap();
    assert_eq!(recv_within(&mut reader).await, Some(3.0));

    hub.close();
    hub.close();
    assert_eq!(hub.join().await, Ok(HubExit::ControlClosed));

    assert_eq!(recv_within(&mut reader).await, None);
    assert_eq!(idle.try_recv(), Ok(3.0));
    assert_eq!(idle.try_recv(), Err(TryRecvError::Closed));
    assert!(control.is_closed());
    assert!(feed.is_closed());
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let mut late = hub.subscribe();
    assert_eq!(recv_within(&mut late).await, None);
    assert_eq!(hub.subscriber_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_source_fires_control_signal() {
    let (feed, source) = stream_source(1);
    let hub = Timeserver::new(source);
    let mut control = hub.control_signal();
    let mut subscription = hub.subscribe();

    drop(feed);
    tokio::time::timeout(WAIT, control.closed())
        .await
        .expect("control signal should fire");
    assert_eq!(recv_within(&mut subscription).await, None);
    assert_eq!(hub.join().await, Ok(HubExit::SourceExhausted));
    assert!(!hub.is_running());
}

#[tokio::test(flavor = "multi_thread")]
async fn source_failure_terminates_hub_abnormally() {
    let hub = Timeserver::new(FailingSource { served: false });
    let mut subscription = hub.subscribe();

    let outcome = tokio::time::timeout(WAIT, hub.join())
        .await
        .expect("hub should stop");
    assert_eq!(
        outcome,
        Err(TimeError::Source("remote stream reset".to_string()))
    );

    // Whatever was delivered before the failure is still readable, then the stream ends.
    while let Ok(time) = subscription.try_recv() {
        assert_eq!(time, 5.0);
    }
    assert!(subscription.is_closed());
    assert!(hub.control_signal().is_closed());
}

#[tokio::test(flavor = "multi_thread")]
async fn subscribing_concurrently_with_delivery() {
    let clock = SyntheticClock::new(Duration::from_millis(1)).unwrap();
    let hub = Arc::new(Timeserver::new(clock));

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let hub = hub.clone();
            tokio::spawn(async move {
                let mut subscription = hub.subscribe();
                subscription.recv().await
            })
        })
        .collect();

    for reader in readers {
        let value = tokio::time::timeout(WAIT, reader)
            .await
            .expect("late subscriber should get a value")
            .expect("reader task");
        assert!(value.is_some());
    }
    hub.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn join_reports_only_once() {
    let (_feed, source) = stream_source(1);
    let hub = Timeserver::new(source);
    assert_eq!(hub.shutdown().await, Ok(HubExit::ControlClosed));
    assert_eq!(hub.join().await, Err(TimeError::AlreadyJoined));
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_timeserver_stops_loop() {
    let (feed, source) = stream_source(1);
    let hub = Timeserver::new(source);
    let mut control = hub.control_signal();
    let mut subscription = hub.subscribe();

    drop(hub);
    tokio::time::timeout(WAIT, control.closed())
        .await
        .expect("control signal should fire on drop");
    assert_eq!(recv_within(&mut subscription).await, None);
    tokio::time::timeout(WAIT, feed.closed())
        .await
        .expect("source should be closed");
}
