//! The actuation surface of one vessel.
//!
//! Five independent single-slot channels; for each, the latest command wins
//! and an unread older command is discarded. Commands are read by whatever
//! forwards them to the game (see [`crate::actuation`]).

use crate::error::{ControlChannel, ControlError};
use crate::types::Vec3;
use spacelib_time::{slot, SlotReceiver, SlotSender};
use std::sync::Mutex;
use tracing::{debug, info};

/// Reading ends of the five control channels.
#[derive(Debug)]
pub struct ControlReceivers {
    pub engage: SlotReceiver<bool>,
    pub throttle: SlotReceiver<f32>,
    pub roll: SlotReceiver<f32>,
    pub direction: SlotReceiver<Vec3>,
    pub rcs: SlotReceiver<Vec3>,
}

/// Writing side of a vessel's control channels.
#[derive(Debug)]
pub struct ControlChannels {
    engage: SlotSender<bool>,
    throttle: SlotSender<f32>,
    roll: SlotSender<f32>,
    direction: SlotSender<Vec3>,
    rcs: SlotSender<Vec3>,
    receivers: Mutex<Option<ControlReceivers>>,
}

impl ControlChannels {
    pub fn new() -> Self {
        let (engage, engage_rx) = slot();
        let (throttle, throttle_rx) = slot();
        let (roll, roll_rx) = slot();
        let (direction, direction_rx) = slot();
        let (rcs, rcs_rx) = slot();
        Self {
            engage,
            throttle,
            roll,
            direction,
            rcs,
            receivers: Mutex::new(Some(ControlReceivers {
                engage: engage_rx,
                throttle: throttle_rx,
                roll: roll_rx,
                direction: direction_rx,
                rcs: rcs_rx,
            })),
        }
    }

    /// Hands out the reading ends. Only the first call gets them.
    pub fn take_receivers(&self) -> Option<ControlReceivers> {
        self.receivers.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Engages or releases the autopilot.
    pub fn set_engage(&self, engaged: bool) -> Result<(), ControlError> {
        write(&self.engage, ControlChannel::Engage, engaged)
    }

    /// Sets the throttle, clamped into `[0, 1]`.
    pub fn set_throttle(&self, throttle: f32) -> Result<(), ControlError> {
        if !throttle.is_finite() {
            return Err(invalid(ControlChannel::Throttle, throttle));
        }
        write(&self.throttle, ControlChannel::Throttle, throttle.clamp(0.0, 1.0))
    }

    pub fn set_roll(&self, roll: f32) -> Result<(), ControlError> {
        if !roll.is_finite() {
            return Err(invalid(ControlChannel::Roll, roll));
        }
        write(&self.roll, ControlChannel::Roll, roll)
    }

    /// Sets the pointing direction.
    pub fn set_direction(&self, direction: Vec3) -> Result<(), ControlError> {
        if !direction.is_finite() {
            return Err(invalid(ControlChannel::Direction, direction));
        }
        write(&self.direction, ControlChannel::Direction, direction)
    }

    /// Sets RCS translation, each component clamped into `[-1, 1]`.
    pub fn set_rcs(&self, rcs: Vec3) -> Result<(), ControlError> {
        if !rcs.is_finite() {
            return Err(invalid(ControlChannel::Rcs, rcs));
        }
        write(&self.rcs, ControlChannel::Rcs, rcs.clamp_unit())
    }

    /// Closes all five channels. Returns `true` only for the call that closed them.
    pub fn close(&self) -> bool {
        // Bitwise `|` so every channel is closed regardless of the others.
        let closed_any = self.engage.close()
            | self.throttle.close()
            | self.roll.close()
            | self.direction.close()
            | self.rcs.close();
        if closed_any {
            info!("🔒 Control channels closed");
        }
        closed_any
    }

    /// `true` once every channel is closed.
    pub fn is_closed(&self) -> bool {
        self.engage.is_closed()
            && self.throttle.is_closed()
            && self.roll.is_closed()
            && self.direction.is_closed()
            && self.rcs.is_closed()
    }
}

impl Default for ControlChannels {
    fn default() -> Self {
        Self::new()
    }
}

fn write<T>(sender: &SlotSender<T>, channel: ControlChannel, value: T) -> Result<(), ControlError> {
    match sender.replace(value) {
        Ok(Some(_)) => {
            debug!(%channel, "Unread command superseded");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(_) => Err(ControlError::Closed(channel)),
    }
}

fn invalid(channel: ControlChannel, value: impl std::fmt::Display) -> ControlError {
    ControlError::InvalidValue {
        channel,
        value: value.to_string(),
    }
}
