// Spacecraft lifecycle against the simulated remote.

use crate::*;
use spacelib_time::{stream_source, HubExit, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

async fn until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should hold in time");
}

async fn launch(name: &str, time_base: TimeBase) -> (SimulatedRemote, Spacecraft) {
    let remote = SimulatedRemote::new(500.0, Duration::from_millis(2));
    let vessel = remote.add_vessel(name);
    let craft = Spacecraft::attach(
        Arc::new(remote.clone()),
        vessel,
        SpacecraftConfig {
            time_base,
            ..SpacecraftConfig::default()
        },
    )
    .await
    .expect("attach");
    (remote, craft)
}

#[tokio::test(flavor = "multi_thread")]
async fn clock_loss_closes_control_channels() {
    let (remote, craft) = launch("Cascade", TimeBase::Universal).await;
    craft.control().set_throttle(0.4).unwrap();

    remote.disconnect();
    until(|| craft.control().is_closed()).await;

    assert_eq!(
        craft.control().set_throttle(0.9),
        Err(ControlError::Closed(ControlChannel::Throttle))
    );
    assert_eq!(craft.timeserver().join().await, Ok(HubExit::SourceExhausted));
}

#[tokio::test(flavor = "multi_thread")]
async fn closing_the_timeserver_cascades_to_controls() {
    let (_remote, craft) = launch("Cascade", TimeBase::Universal).await;
    craft.timeserver().close();
    until(|| craft.control().is_closed()).await;
    assert_eq!(craft.timeserver().join().await, Ok(HubExit::ControlClosed));
}

#[tokio::test(flavor = "multi_thread")]
async fn close_is_idempotent_and_shutdown_completes() {
    let (_remote, craft) = launch("Closer", TimeBase::Universal).await;
    let mut subscription = craft.subscribe();

    craft.close();
    craft.close();
    assert!(craft.control().is_closed());

    let closed = tokio::time::timeout(WAIT, async {
        while subscription.recv().await.is_some() {}
    })
    .await;
    assert!(closed.is_ok());

    let exit = tokio::time::timeout(WAIT, craft.shutdown())
        .await
        .expect("shutdown should finish");
    assert_eq!(exit, Ok(HubExit::ControlClosed));
}

#[tokio::test(flavor = "multi_thread")]
async fn mission_elapsed_clock_starts_near_zero() {
    let (_remote, craft) = launch("Elapsed", TimeBase::MissionElapsed).await;
    assert_eq!(craft.timeserver().label(), "met");

    let mut subscription = craft.subscribe();
    let met = tokio::time::timeout(WAIT, subscription.recv())
        .await
        .unwrap()
        .expect("a mission elapsed time value");
    assert!((0.0..100.0).contains(&met));

    let span = tokio::time::timeout(WAIT, craft.delay(0.05))
        .await
        .unwrap()
        .unwrap();
    assert!(span.elapsed() >= 0.05 - craft.timeserver().resolution_epsilon());
    assert!(!span.interrupted);
    craft.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn periodic_stream_respects_gap() {
    let (_remote, craft) = launch("Ticker", TimeBase::Universal).await;
    let mut ticks = craft.periodic(0.02);

    let first = tokio::time::timeout(WAIT, ticks.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(WAIT, ticks.recv()).await.unwrap().unwrap();
    assert!(second - first > 0.02);
    craft.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_name_keeps_cache_when_remote_is_gone() {
    let (remote, craft) = launch("Original", TimeBase::Universal).await;
    remote.rename_vessel(craft.id(), "Renamed").unwrap();
    assert_eq!(craft.name().await, "Original");
    assert_eq!(craft.refresh_name().await, "Renamed");

    remote.disconnect();
    assert_eq!(craft.refresh_name().await, "Renamed");
    assert_eq!(craft.name().await, "Renamed");
}

#[tokio::test(flavor = "multi_thread")]
async fn parts_are_cached_after_first_lookup() {
    let (remote, craft) = launch("Parts", TimeBase::Universal).await;
    let engine = remote.add_part(craft.id(), "engine").unwrap();

    assert_eq!(craft.part("engine").await, Ok(engine.clone()));
    assert_eq!(
        craft.part("antenna").await,
        Err(RemoteError::PartNotFound("antenna".to_string()))
    );

    // Served from the cache once the remote is unreachable.
    remote.disconnect();
    assert_eq!(craft.part("engine").await, Ok(engine));
    assert_eq!(craft.part("antenna").await, Err(RemoteError::Disconnected));
}

#[tokio::test(flavor = "multi_thread")]
async fn named_events_wake_registered_waiters() {
    let (_remote, craft) = launch("Events", TimeBase::Universal).await;
    let staged = craft.wait_for("stage");
    let waiter = tokio::spawn(staged);

    assert_eq!(craft.event_count("stage"), 0);
    craft.notify("stage");
    tokio::time::timeout(WAIT, waiter)
        .await
        .expect("waiter should wake")
        .unwrap();
    assert_eq!(craft.event_count("stage"), 1);
    assert_eq!(craft.event_count("abort"), 0);
    craft.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn actuation_follows_spacecraft_commands() {
    let remote = SimulatedRemote::default();
    let vessel = remote.add_vessel("Driven");
    let (_feed, source) = stream_source(1);
    let craft = Spacecraft::with_source(
        Arc::new(remote.clone()),
        vessel,
        "Driven".to_string(),
        source,
        SpacecraftConfig::default(),
    );
    let receivers = craft.control().take_receivers().unwrap();
    let tasks = spawn_actuation(receivers, Arc::new(remote.actuator(vessel)));

    craft.control().set_engage(true).unwrap();
    craft.control().set_throttle(2.0).unwrap();
    until(|| {
        remote
            .controls(vessel)
            .map(|c| c.engaged && c.throttle == 1.0)
            .unwrap_or(false)
    })
    .await;

    craft.close();
    for task in tasks {
        tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unread_control_commands_coalesce_on_spacecraft() {
    let (_remote, craft) = launch("Coalesce", TimeBase::Universal).await;
    let mut receivers = craft.control().take_receivers().unwrap();

    craft.control().set_roll(10.0).unwrap();
    craft.control().set_roll(20.0).unwrap();
    craft.control().set_roll(30.0).unwrap();
    assert_eq!(receivers.roll.try_recv(), Ok(30.0));
    assert_eq!(receivers.roll.try_recv(), Err(TryRecvError::Empty));
    craft.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_classifies_failures() {
    let remote = SimulatedRemote::default();
    let connector = SimulatedConnector::new(remote.clone());

    let client = connect(&connector, "127.0.0.1:50000").await;
    assert!(client.is_ok());

    let protocol = connect(&connector, "not an address").await;
    assert!(matches!(protocol, Err(ConnectError::Protocol(_))));

    remote.disconnect();
    match connect(&connector, "127.0.0.1:50000").await {
        Err(ConnectError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused),
        other => panic!("expected Io error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn attach_to_unknown_vessel_fails() {
    let remote = SimulatedRemote::default();
    let stranger = VesselId::new();
    let result = Spacecraft::attach(Arc::new(remote), stranger, SpacecraftConfig::default()).await;
    assert!(matches!(result, Err(RemoteError::UnknownVessel(id)) if id == stranger));
}
