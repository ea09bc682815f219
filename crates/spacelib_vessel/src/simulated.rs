//! In-process stand-in for a connected game.
//!
//! Universal time advances with the local clock from a configurable offset.
//! Vessels, parts and actuation state live in a shared map, so tests and the
//! demo binary can drive the library end to end without a server.

use crate::actuation::Actuator;
use crate::error::{BoxError, ProtocolError, RemoteError};
use crate::remote::{Connector, RemoteClient};
use crate::types::{PartRef, Vec3, VesselId};
use async_trait::async_trait;
use dashmap::DashMap;
use spacelib_time::{stream_source, StreamFeed, StreamSource};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// How often simulated streams push a value.
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(10);

const STREAM_CAPACITY: usize = 4;

/// Last actuation state applied to a simulated vessel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VesselControls {
    pub engaged: bool,
    pub throttle: f32,
    pub roll: f32,
    pub direction: Vec3,
    pub rcs: Vec3,
}

#[derive(Debug)]
struct SimVessel {
    name: String,
    launched_at: f64,
    parts: Vec<PartRef>,
    controls: VesselControls,
}

#[derive(Debug)]
struct Inner {
    epoch: Instant,
    ut_offset: f64,
    stream_interval: Duration,
    vessels: DashMap<VesselId, SimVessel>,
    next_part_id: AtomicU64,
    disconnected: watch::Sender<bool>,
}

impl Inner {
    fn universal_time(&self) -> f64 {
        self.ut_offset + self.epoch.elapsed().as_secs_f64()
    }

    fn mission_elapsed_time(&self, vessel: VesselId) -> Option<f64> {
        let launched_at = self.vessels.get(&vessel)?.launched_at;
        Some(self.universal_time() - launched_at)
    }

    fn is_connected(&self) -> bool {
        !*self.disconnected.borrow()
    }

    fn ensure_connected(&self) -> Result<(), RemoteError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RemoteError::Disconnected)
        }
    }
}

/// A simulated game shared by every clone.
#[derive(Debug, Clone)]
pub struct SimulatedRemote {
    inner: Arc<Inner>,
}

impl SimulatedRemote {
    /// Starts the universal clock at `ut_offset` seconds.
    pub fn new(ut_offset: f64, stream_interval: Duration) -> Self {
        let (disconnected, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                ut_offset,
                stream_interval: stream_interval.max(Duration::from_millis(1)),
                vessels: DashMap::new(),
                next_part_id: AtomicU64::new(1),
                disconnected,
            }),
        }
    }

    /// Adds a vessel launched at the current universal time.
    pub fn add_vessel(&self, name: impl Into<String>) -> VesselId {
        let id = VesselId::new();
        let name = name.into();
        info!("🚀 Simulated vessel '{}' launched ({})", name, id);
        self.inner.vessels.insert(
            id,
            SimVessel {
                name,
                launched_at: self.inner.universal_time(),
                parts: Vec::new(),
                controls: VesselControls::default(),
            },
        );
        id
    }

    /// Tags a new part on `vessel`.
    pub fn add_part(&self, vessel: VesselId, tag: impl Into<String>) -> Result<PartRef, RemoteError> {
        let mut entry = self
            .inner
            .vessels
            .get_mut(&vessel)
            .ok_or(RemoteError::UnknownVessel(vessel))?;
        let part = PartRef {
            vessel,
            tag: tag.into(),
            id: self.inner.next_part_id.fetch_add(1, Ordering::Relaxed),
        };
        entry.parts.push(part.clone());
        Ok(part)
    }

    pub fn rename_vessel(&self, vessel: VesselId, name: impl Into<String>) -> Result<(), RemoteError> {
        let mut entry = self
            .inner
            .vessels
            .get_mut(&vessel)
            .ok_or(RemoteError::UnknownVessel(vessel))?;
        entry.name = name.into();
        Ok(())
    }

    /// Last actuation state applied to `vessel`.
    pub fn controls(&self, vessel: VesselId) -> Option<VesselControls> {
        self.inner.vessels.get(&vessel).map(|v| v.controls)
    }

    /// An [`Actuator`] that writes into `vessel`'s simulated state.
    pub fn actuator(&self, vessel: VesselId) -> SimulatedActuator {
        SimulatedActuator {
            remote: self.clone(),
            vessel,
        }
    }

    /// Drops the connection. Every call fails afterwards and every stream ends.
    pub fn disconnect(&self) {
        if !self.inner.disconnected.send_replace(true) {
            info!("🔌 Simulated remote disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn open_stream<F>(&self, what: &'static str, sample: F) -> StreamSource
    where
        F: Fn(&Inner) -> Option<f64> + Send + 'static,
    {
        let (feed, source) = stream_source(STREAM_CAPACITY);
        tokio::spawn(run_feed(self.inner.clone(), feed, what, sample));
        source
    }

    fn update_controls(
        &self,
        vessel: VesselId,
        apply: impl FnOnce(&mut VesselControls),
    ) -> Result<(), RemoteError> {
        self.inner.ensure_connected()?;
        let mut entry = self
            .inner
            .vessels
            .get_mut(&vessel)
            .ok_or(RemoteError::UnknownVessel(vessel))?;
        apply(&mut entry.controls);
        Ok(())
    }
}

impl Default for SimulatedRemote {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_STREAM_INTERVAL)
    }
}

async fn run_feed<F>(inner: Arc<Inner>, feed: StreamFeed, what: &'static str, sample: F)
where
    F: Fn(&Inner) -> Option<f64>,
{
    let mut disconnected = inner.disconnected.subscribe();
    let mut ticker = tokio::time::interval(inner.stream_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = disconnected.wait_for(|gone| *gone) => break,
            _ = feed.closed() => break,
            _ = ticker.tick() => {
                let Some(value) = sample(&inner) else { break };
                // A full queue means the reader is behind; the next tick carries a newer value.
                if feed.try_push(value).is_err() {
                    break;
                }
            }
        }
    }
    debug!(stream = what, "Simulated stream ended");
}

#[async_trait]
impl RemoteClient for SimulatedRemote {
    async fn universal_time(&self) -> Result<f64, RemoteError> {
        self.inner.ensure_connected()?;
        Ok(self.inner.universal_time())
    }

    async fn mission_elapsed_time(&self, vessel: VesselId) -> Result<f64, RemoteError> {
        self.inner.ensure_connected()?;
        self.inner
            .mission_elapsed_time(vessel)
            .ok_or(RemoteError::UnknownVessel(vessel))
    }

    async fn vessel_name(&self, vessel: VesselId) -> Result<String, RemoteError> {
        self.inner.ensure_connected()?;
        self.inner
            .vessels
            .get(&vessel)
            .map(|v| v.name.clone())
            .ok_or(RemoteError::UnknownVessel(vessel))
    }

    async fn find_part(&self, vessel: VesselId, tag: &str) -> Result<Option<PartRef>, RemoteError> {
        self.inner.ensure_connected()?;
        let entry = self
            .inner
            .vessels
            .get(&vessel)
            .ok_or(RemoteError::UnknownVessel(vessel))?;
        Ok(entry.parts.iter().find(|p| p.tag == tag).cloned())
    }

    async fn stream_universal_time(&self) -> Result<StreamSource, RemoteError> {
        self.inner.ensure_connected()?;
        Ok(self.open_stream("ut", |inner| Some(inner.universal_time())))
    }

    async fn stream_mission_elapsed_time(&self, vessel: VesselId) -> Result<StreamSource, RemoteError> {
        self.inner.ensure_connected()?;
        if !self.inner.vessels.contains_key(&vessel) {
            return Err(RemoteError::UnknownVessel(vessel));
        }
        Ok(self.open_stream("met", move |inner| inner.mission_elapsed_time(vessel)))
    }
}

/// Writes actuation commands into a simulated vessel.
#[derive(Debug, Clone)]
pub struct SimulatedActuator {
    remote: SimulatedRemote,
    vessel: VesselId,
}

#[async_trait]
impl Actuator for SimulatedActuator {
    async fn engage(&self, engaged: bool) -> Result<(), RemoteError> {
        self.remote.update_controls(self.vessel, |c| c.engaged = engaged)
    }

    async fn throttle(&self, throttle: f32) -> Result<(), RemoteError> {
        self.remote.update_controls(self.vessel, |c| c.throttle = throttle)
    }

    async fn roll(&self, roll: f32) -> Result<(), RemoteError> {
        self.remote.update_controls(self.vessel, |c| c.roll = roll)
    }

    async fn direction(&self, direction: Vec3) -> Result<(), RemoteError> {
        self.remote.update_controls(self.vessel, |c| c.direction = direction)
    }

    async fn rcs(&self, rcs: Vec3) -> Result<(), RemoteError> {
        self.remote.update_controls(self.vessel, |c| c.rcs = rcs)
    }
}

/// Hands out a shared [`SimulatedRemote`] for any well-formed socket address.
#[derive(Debug, Clone)]
pub struct SimulatedConnector {
    remote: SimulatedRemote,
}

impl SimulatedConnector {
    pub fn new(remote: SimulatedRemote) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Connector for SimulatedConnector {
    type Client = SimulatedRemote;

    async fn open(&self, address: &str) -> Result<SimulatedRemote, BoxError> {
        let _addr: SocketAddr = address
            .parse()
            .map_err(|_| ProtocolError(format!("not a socket address: '{address}'")))?;
        if !self.remote.is_connected() {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "simulated game is not accepting connections",
            )));
        }
        Ok(self.remote.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spacelib_time::TimeSource;

    #[tokio::test(flavor = "multi_thread")]
    async fn universal_time_starts_at_offset_and_advances() {
        let remote = SimulatedRemote::new(1_000.0, DEFAULT_STREAM_INTERVAL);
        let first = remote.universal_time().await.unwrap();
        assert!(first >= 1_000.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(remote.universal_time().await.unwrap() > first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn vessels_and_parts_are_queryable() {
        let remote = SimulatedRemote::default();
        let vessel = remote.add_vessel("Kerbal X");
        let part = remote.add_part(vessel, "main-engine").unwrap();

        assert_eq!(remote.vessel_name(vessel).await.unwrap(), "Kerbal X");
        assert_eq!(remote.find_part(vessel, "main-engine").await.unwrap(), Some(part));
        assert_eq!(remote.find_part(vessel, "decoupler").await.unwrap(), None);

        remote.rename_vessel(vessel, "Kerbal X Debris").unwrap();
        assert_eq!(remote.vessel_name(vessel).await.unwrap(), "Kerbal X Debris");

        let stranger = VesselId::new();
        assert_eq!(
            remote.vessel_name(stranger).await,
            Err(RemoteError::UnknownVessel(stranger))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn streams_end_when_disconnected() {
        let remote = SimulatedRemote::default();
        let mut stream = remote.stream_universal_time().await.unwrap();
        let first = stream.next().await.unwrap();
        assert!(first.is_some());

        remote.disconnect();
        let ended = tokio::time::timeout(Duration::from_secs(5), async {
            while stream.next().await.unwrap().is_some() {}
        })
        .await;
        assert!(ended.is_ok());
        assert_eq!(remote.universal_time().await, Err(RemoteError::Disconnected));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn actuator_records_controls() {
        let remote = SimulatedRemote::default();
        let vessel = remote.add_vessel("Probe");
        let actuator = remote.actuator(vessel);

        actuator.engage(true).await.unwrap();
        actuator.throttle(0.75).await.unwrap();
        actuator.direction(Vec3::new(0.0, 0.0, 1.0)).await.unwrap();

        let controls = remote.controls(vessel).unwrap();
        assert!(controls.engaged);
        assert_eq!(controls.throttle, 0.75);
        assert_eq!(controls.direction, Vec3::new(0.0, 0.0, 1.0));
    }
}
