//! The remote game boundary.
//!
//! Everything the library needs from the game goes through [`RemoteClient`].
//! Connections are opened by a [`Connector`]; [`connect`] classifies whatever
//! the connector reports into a [`ConnectError`].

use crate::error::{BoxError, ConnectError, RemoteError};
use crate::types::{PartRef, VesselId};
use async_trait::async_trait;
use spacelib_time::StreamSource;
use tracing::{error, info};

/// Calls and value streams offered by a connected game.
#[async_trait]
pub trait RemoteClient: Send + Sync + 'static {
    /// Current universal time in seconds.
    async fn universal_time(&self) -> Result<f64, RemoteError>;

    /// Mission elapsed time of `vessel` in seconds.
    async fn mission_elapsed_time(&self, vessel: VesselId) -> Result<f64, RemoteError>;

    async fn vessel_name(&self, vessel: VesselId) -> Result<String, RemoteError>;

    /// Looks up a part by tag. `Ok(None)` when no part carries the tag.
    async fn find_part(&self, vessel: VesselId, tag: &str) -> Result<Option<PartRef>, RemoteError>;

    /// Opens a pushed stream of universal time.
    async fn stream_universal_time(&self) -> Result<StreamSource, RemoteError>;

    /// Opens a pushed stream of `vessel`'s mission elapsed time.
    async fn stream_mission_elapsed_time(&self, vessel: VesselId) -> Result<StreamSource, RemoteError>;
}

/// Opens connections to a game.
#[async_trait]
pub trait Connector: Send + Sync {
    type Client: RemoteClient;

    async fn open(&self, address: &str) -> Result<Self::Client, BoxError>;
}

/// Connects through `connector`, classifying any failure.
pub async fn connect<C: Connector>(connector: &C, address: &str) -> Result<C::Client, ConnectError> {
    match connector.open(address).await {
        Ok(client) => {
            info!("🔌 Connected to {}", address);
            Ok(client)
        }
        Err(e) => {
            let classified = ConnectError::classify(e);
            error!("❌ Connection to {} failed: {}", address, classified);
            Err(classified)
        }
    }
}
