//! # spacelib vessel
//!
//! Vessel-side pieces built on [`spacelib_time`]: the five coalescing control
//! channels of a vessel, the [`Spacecraft`] that ties them to a timeserver,
//! and the boundary to the remote game.
//!
//! A spacecraft's control channels are closed automatically when its clock
//! stops, whether because the remote stream ended or because the timeserver
//! was closed.

pub mod actuation;
pub mod control;
pub mod error;
pub mod remote;
pub mod simulated;
pub mod spacecraft;
pub mod types;

#[cfg(test)]
mod tests;

pub use actuation::{spawn_actuation, Actuator};
pub use control::{ControlChannels, ControlReceivers};
pub use error::{BoxError, ConnectError, ControlChannel, ControlError, ProtocolError, RemoteError};
pub use remote::{connect, Connector, RemoteClient};
pub use simulated::{
    SimulatedActuator, SimulatedConnector, SimulatedRemote, VesselControls,
    DEFAULT_STREAM_INTERVAL,
};
pub use spacecraft::{Spacecraft, SpacecraftConfig};
pub use types::{PartRef, TimeBase, Vec3, VesselId};
