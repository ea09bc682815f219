//! # spacelib time
//!
//! Fan-out of one authoritative clock ("universal time") to many independent
//! readers, so control logic can react to the clock without each piece of it
//! polling the remote game.
//!
//! ## Pieces
//!
//! - [`TimeSource`]: the upstream producer. [`SyntheticClock`] samples the
//!   local wall clock, [`StreamSource`] is driven by a remote value stream.
//! - [`Timeserver`]: owns the source and runs one loop that fans every value
//!   out to its subscribers without ever waiting on them.
//! - [`Subscription`]: a one-value coalescing channel; a reader that falls
//!   behind sees only the newest value.
//! - [`periodic_subscription`]: a derived stream gated by a minimum gap.
//! - [`delay`]: wait until a number of stream seconds have passed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use spacelib_time::{delay, periodic_subscription, SyntheticClock, Timeserver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hub = Timeserver::new(SyntheticClock::default());
//!
//!     let mut every_second = periodic_subscription(&hub, 1.0);
//!     tokio::spawn(async move {
//!         while let Some(ut) = every_second.recv().await {
//!             println!("tick at {ut:.2}");
//!         }
//!     });
//!
//!     let span = delay(&hub, 5.0).await?;
//!     println!("waited {:.3}s", span.elapsed());
//!
//!     hub.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod delay;
pub mod error;
pub mod periodic;
pub mod slot;
pub mod source;
pub mod subscription;
pub mod timeserver;

#[cfg(test)]
mod tests;

pub use delay::{delay, delay_or_interrupt, DelaySpan};
pub use error::TimeError;
pub use periodic::periodic_subscription;
pub use slot::{slot, OfferError, SlotClosed, SlotReceiver, SlotSender, TryRecvError};
pub use source::{stream_source, StreamFeed, StreamSource, SyntheticClock, TimeSource};
pub use subscription::{with_subscription, ControlSignal, Subscription};
pub use timeserver::{
    HubExit, Timeserver, TimeserverConfig, DEFAULT_RESOLUTION_EPSILON, NOT_YET_RECEIVED,
};
