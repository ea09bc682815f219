//! Error types for the time broadcast subsystem.

use std::time::Duration;

/// Failures surfaced by time sources, the broadcast hub and the delay primitive.
///
/// A subscriber closing its own channel and an upstream source running dry are
/// not errors; both show up as channels ending.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimeError {
    /// A synthetic clock was asked to tick with a zero period
    #[error("Invalid clock period: {0:?}")]
    InvalidPeriod(Duration),

    /// The local wall clock could not be read
    #[error("System clock error: {0}")]
    Clock(String),

    /// The upstream source failed while producing a value
    #[error("Upstream source error: {0}")]
    Source(String),

    /// A feed was pushed to after its source closed
    #[error("Time feed closed")]
    FeedClosed,

    /// The subscriber registry lock was poisoned; delivery cannot continue
    #[error("Subscriber registry poisoned")]
    RegistryPoisoned,

    /// The hub task was already joined
    #[error("Timeserver already joined")]
    AlreadyJoined,

    /// The hub task panicked or was aborted
    #[error("Timeserver task failed: {0}")]
    Join(String),
}
