//! A controllable vessel.
//!
//! Each [`Spacecraft`] owns one [`ControlChannels`] hub and one
//! [`Timeserver`] following either universal time or its own mission elapsed
//! time. A supervisor task closes the control channels once the timeserver
//! stops, so a lost clock never leaves a vessel half-controllable.

use crate::control::ControlChannels;
use crate::error::RemoteError;
use crate::remote::RemoteClient;
use crate::types::{PartRef, TimeBase, VesselId};
use dashmap::DashMap;
use spacelib_time::{
    delay, delay_or_interrupt, periodic_subscription, ControlSignal, DelaySpan, HubExit,
    Subscription, TimeError, TimeSource, Timeserver, TimeserverConfig, DEFAULT_RESOLUTION_EPSILON,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a spacecraft's timeserver is set up.
#[derive(Debug, Clone)]
pub struct SpacecraftConfig {
    pub time_base: TimeBase,
    pub resolution_epsilon: f64,
}

impl Default for SpacecraftConfig {
    fn default() -> Self {
        Self {
            time_base: TimeBase::Universal,
            resolution_epsilon: DEFAULT_RESOLUTION_EPSILON,
        }
    }
}

pub struct Spacecraft {
    id: VesselId,
    name: RwLock<String>,
    remote: Arc<dyn RemoteClient>,
    parts: DashMap<String, PartRef>,
    events: DashMap<String, Arc<watch::Sender<u64>>>,
    control: Arc<ControlChannels>,
    timeserver: Timeserver,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Spacecraft {
    /// Attaches to `vessel`, clocked by the remote stream `config.time_base` selects.
    pub async fn attach(
        remote: Arc<dyn RemoteClient>,
        vessel: VesselId,
        config: SpacecraftConfig,
    ) -> Result<Self, RemoteError> {
        let name = remote.vessel_name(vessel).await?;
        let source = match config.time_base {
            TimeBase::Universal => remote.stream_universal_time().await?,
            TimeBase::MissionElapsed => remote.stream_mission_elapsed_time(vessel).await?,
        };
        Ok(Self::with_source(remote, vessel, name, source, config))
    }

    /// Builds a spacecraft around an already opened time source.
    pub fn with_source<S: TimeSource>(
        remote: Arc<dyn RemoteClient>,
        vessel: VesselId,
        name: String,
        source: S,
        config: SpacecraftConfig,
    ) -> Self {
        let timeserver = Timeserver::with_config(
            source,
            TimeserverConfig {
                label: config.time_base.to_string(),
                resolution_epsilon: config.resolution_epsilon,
            },
        );
        let control = Arc::new(ControlChannels::new());
        let supervisor = tokio::spawn(supervise(
            timeserver.control_signal(),
            control.clone(),
            name.clone(),
        ));
        info!("🛰️ Spacecraft '{}' attached ({} clock)", name, config.time_base);

        Self {
            id: vessel,
            name: RwLock::new(name),
            remote,
            parts: DashMap::new(),
            events: DashMap::new(),
            control,
            timeserver,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    pub fn id(&self) -> VesselId {
        self.id
    }

    /// Cached name. See [`Spacecraft::refresh_name`].
    pub async fn name(&self) -> String {
        self.name.read().await.clone()
    }

    /// Re-reads the name from the remote, keeping the cached one on failure.
    pub async fn refresh_name(&self) -> String {
        match self.remote.vessel_name(self.id).await {
            Ok(name) => {
                *self.name.write().await = name.clone();
                name
            }
            Err(e) => {
                let cached = self.name().await;
                warn!("⚠️ Could not refresh name of '{}': {}", cached, e);
                cached
            }
        }
    }

    /// Looks up a part by tag, caching hits.
    pub async fn part(&self, tag: &str) -> Result<PartRef, RemoteError> {
        if let Some(part) = self.parts.get(tag) {
            return Ok(part.clone());
        }
        let part = self
            .remote
            .find_part(self.id, tag)
            .await?
            .ok_or_else(|| RemoteError::PartNotFound(tag.to_string()))?;
        self.parts.insert(tag.to_string(), part.clone());
        Ok(part)
    }

    fn event(&self, name: &str) -> Arc<watch::Sender<u64>> {
        self.events
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(watch::channel(0).0))
            .clone()
    }

    /// How many times `name` has been notified.
    pub fn event_count(&self, name: &str) -> u64 {
        self.events
            .get(name)
            .map(|event| *event.borrow())
            .unwrap_or(0)
    }

    /// Wakes everyone waiting on `name`.
    pub fn notify(&self, name: &str) {
        debug!(event = name, "Event notified");
        self.event(name).send_modify(|count| *count += 1);
    }

    /// Resolves on the first [`Spacecraft::notify`] of `name` issued after this call.
    pub fn wait_for(&self, name: &str) -> impl Future<Output = ()> + Send + 'static {
        let mut waiter = self.event(name).subscribe();
        async move {
            let _ = waiter.changed().await;
        }
    }

    pub fn control(&self) -> &ControlChannels {
        &self.control
    }

    pub fn timeserver(&self) -> &Timeserver {
        &self.timeserver
    }

    pub fn subscribe(&self) -> Subscription {
        self.timeserver.subscribe()
    }

    /// Waits `seconds` on this spacecraft's clock.
    pub async fn delay(&self, seconds: f64) -> Result<DelaySpan, TimeError> {
        delay(&self.timeserver, seconds).await
    }

    /// Like [`Spacecraft::delay`], but gives up early when `interrupt` completes.
    pub async fn delay_or_interrupt<I>(&self, seconds: f64, interrupt: I) -> Result<DelaySpan, TimeError>
    where
        I: Future<Output = ()>,
    {
        delay_or_interrupt(&self.timeserver, seconds, interrupt).await
    }

    /// Derived stream emitting at most once per `min_gap` seconds.
    pub fn periodic(&self, min_gap: f64) -> Subscription {
        periodic_subscription(&self.timeserver, min_gap)
    }

    /// Closes the control channels and the timeserver. Safe to call repeatedly.
    pub fn close(&self) {
        self.control.close();
        self.timeserver.close();
    }

    /// Closes everything and waits for the timeserver and supervisor to finish.
    pub async fn shutdown(self) -> Result<HubExit, TimeError> {
        self.close();
        let exit = self.timeserver.join().await;
        let supervisor = self.supervisor.lock().ok().and_then(|mut guard| guard.take());
        if let Some(supervisor) = supervisor {
            supervisor
                .await
                .map_err(|e| TimeError::Join(e.to_string()))?;
        }
        exit
    }
}

impl Drop for Spacecraft {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Spacecraft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spacecraft")
            .field("id", &self.id)
            .field("timeserver", &self.timeserver.label())
            .field("parts", &self.parts.len())
            .finish()
    }
}

async fn supervise(mut signal: ControlSignal, control: Arc<ControlChannels>, name: String) {
    signal.closed().await;
    if control.close() {
        info!("🛑 Clock of '{}' stopped, vessel is no longer controllable", name);
    } else {
        debug!(vessel = %name, "Control channels were already closed");
    }
}
