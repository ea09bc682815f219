//! Signal handling for graceful shutdown.
//!
//! Listens for SIGINT/SIGTERM (Ctrl+C on Windows) and records the request in
//! a [`ShutdownState`] that running tasks can poll or wait on.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Shared shutdown flag. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    initiated: Arc<watch::Sender<bool>>,
}

impl ShutdownState {
    pub fn new() -> Self {
        let (initiated, _) = watch::channel(false);
        Self {
            initiated: Arc::new(initiated),
        }
    }

    /// Returns true once shutdown has been requested.
    pub fn is_shutdown_initiated(&self) -> bool {
        *self.initiated.borrow()
    }

    /// Requests shutdown. Only the first call logs.
    pub fn initiate_shutdown(&self) {
        if !self.initiated.send_replace(true) {
            info!("🛑 Shutdown initiated");
        }
    }

    /// Resolves once shutdown has been requested.
    pub async fn wait(&self) {
        let mut initiated = self.initiated.subscribe();
        let _ = initiated.wait_for(|flag| *flag).await;
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a termination signal, then marks `state` as shutting down.
pub async fn setup_signal_handlers(state: &ShutdownState) -> Result<(), Box<dyn std::error::Error>> {
    wait_for_signal().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    state.initiate_shutdown();
    Ok(())
}

/// Waits for a termination signal without logging.
pub async fn wait_for_signal() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
