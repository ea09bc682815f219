//! # Core Type Definitions
//!
//! Identifiers and small value types shared by the control and remote layers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a vessel in the remote game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VesselId(pub Uuid);

impl VesselId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for VesselId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VesselId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a tagged part of a vessel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartRef {
    pub vessel: VesselId,
    pub tag: String,
    pub id: u64,
}

/// Three-component vector used for direction and RCS commands.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Clamps every component into `[-1, 1]`.
    pub fn clamp_unit(self) -> Self {
        Self {
            x: self.x.clamp(-1.0, 1.0),
            y: self.y.clamp(-1.0, 1.0),
            z: self.z.clamp(-1.0, 1.0),
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Which clock a spacecraft's timeserver follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Global universal time
    #[default]
    Universal,
    /// The vessel's own mission elapsed time
    MissionElapsed,
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBase::Universal => write!(f, "ut"),
            TimeBase::MissionElapsed => write!(f, "met"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_unit_limits_each_component() {
        let clamped = Vec3::new(2.0, -3.0, 0.25).clamp_unit();
        assert_eq!(clamped, Vec3::new(1.0, -1.0, 0.25));
    }

    #[test]
    fn time_base_display_matches_log_labels() {
        assert_eq!(TimeBase::Universal.to_string(), "ut");
        assert_eq!(TimeBase::MissionElapsed.to_string(), "met");
    }

    #[test]
    fn vessel_ids_are_unique() {
        assert_ne!(VesselId::new(), VesselId::new());
    }
}
