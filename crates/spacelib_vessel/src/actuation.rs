//! Forwarding of control commands to the game.
//!
//! One task per channel reads the latest command and hands it to an
//! [`Actuator`]. A forwarder ends when its channel closes.

use crate::control::ControlReceivers;
use crate::error::RemoteError;
use crate::types::Vec3;
use async_trait::async_trait;
use spacelib_time::SlotReceiver;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Applies actuation commands to a vessel.
#[async_trait]
pub trait Actuator: Send + Sync + 'static {
    async fn engage(&self, engaged: bool) -> Result<(), RemoteError>;
    async fn throttle(&self, throttle: f32) -> Result<(), RemoteError>;
    async fn roll(&self, roll: f32) -> Result<(), RemoteError>;
    async fn direction(&self, direction: Vec3) -> Result<(), RemoteError>;
    async fn rcs(&self, rcs: Vec3) -> Result<(), RemoteError>;
}

/// Starts one forwarding task per channel.
pub fn spawn_actuation<A: Actuator>(
    receivers: ControlReceivers,
    actuator: Arc<A>,
) -> Vec<JoinHandle<()>> {
    let ControlReceivers {
        engage,
        throttle,
        roll,
        direction,
        rcs,
    } = receivers;

    let a = actuator.clone();
    let engage = tokio::spawn(forward("engage", engage, move |v| {
        let a = a.clone();
        async move { a.engage(v).await }
    }));
    let a = actuator.clone();
    let throttle = tokio::spawn(forward("throttle", throttle, move |v| {
        let a = a.clone();
        async move { a.throttle(v).await }
    }));
    let a = actuator.clone();
    let roll = tokio::spawn(forward("roll", roll, move |v| {
        let a = a.clone();
        async move { a.roll(v).await }
    }));
    let a = actuator.clone();
    let direction = tokio::spawn(forward("direction", direction, move |v| {
        let a = a.clone();
        async move { a.direction(v).await }
    }));
    let a = actuator;
    let rcs = tokio::spawn(forward("rcs", rcs, move |v| {
        let a = a.clone();
        async move { a.rcs(v).await }
    }));

    vec![engage, throttle, roll, direction, rcs]
}

async fn forward<T, F, Fut>(channel: &'static str, mut rx: SlotReceiver<T>, apply: F)
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), RemoteError>> + Send,
{
    while let Some(value) = rx.recv().await {
        if let Err(e) = apply(value).await {
            warn!(channel, "⚠️ Actuation failed: {}", e);
        }
    }
    debug!(channel, "Actuation forwarder stopped");
}
