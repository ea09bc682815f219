//! Error types for vessel control and the remote boundary.
//!
//! Connection failures are classified into I/O, protocol and unclassified
//! failures so callers get a typed result instead of an opaque error.

use crate::types::VesselId;
use std::fmt;

/// The five actuation channels of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlChannel {
    Engage,
    Throttle,
    Roll,
    Direction,
    Rcs,
}

impl fmt::Display for ControlChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlChannel::Engage => "engage",
            ControlChannel::Throttle => "throttle",
            ControlChannel::Roll => "roll",
            ControlChannel::Direction => "direction",
            ControlChannel::Rcs => "rcs",
        };
        f.write_str(name)
    }
}

/// Failures when issuing actuation commands.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ControlError {
    /// The channel has been closed; the vessel is no longer controllable
    #[error("Control channel '{0}' is closed")]
    Closed(ControlChannel),

    /// The command value is not a finite number
    #[error("Invalid value for '{channel}': {value}")]
    InvalidValue {
        channel: ControlChannel,
        value: String,
    },
}

/// Failures of calls across the remote boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    /// The remote connection is gone
    #[error("Remote connection closed")]
    Disconnected,

    /// The remote side does not know this vessel
    #[error("Unknown vessel: {0}")]
    UnknownVessel(VesselId),

    /// No part carries the requested tag
    #[error("Part not found: {0}")]
    PartNotFound(String),

    /// The remote call itself failed
    #[error("Remote call failed: {0}")]
    Call(String),
}

/// A connector's report that the peer spoke the wrong protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ProtocolError(pub String);

/// Boxed error produced by a connector before classification.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome classes of a failed connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Socket-level failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer answered but violated the protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Anything else
    #[error("Connection failed: {0}")]
    Unclassified(String),
}

impl ConnectError {
    /// Sorts a connector's error into one of the three classes.
    pub fn classify(error: BoxError) -> Self {
        let error = match error.downcast::<std::io::Error>() {
            Ok(io) => return ConnectError::Io(*io),
            Err(other) => other,
        };
        match error.downcast::<ProtocolError>() {
            Ok(protocol) => ConnectError::Protocol(protocol.0),
            Err(other) => ConnectError::Unclassified(other.to_string()),
        }
    }
}
