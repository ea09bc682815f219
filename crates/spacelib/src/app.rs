//! Main application logic and lifecycle management.
//!
//! The `Application` launches one vessel in a simulated game, attaches a
//! spacecraft to it and flies a short engine burn on the spacecraft's clock
//! while reporting status at a fixed cadence. Shutdown closes the spacecraft
//! first, then waits for its timeserver and every helper task.

use crate::{
    cli::CliArgs,
    config::{AppConfig, ClockSource},
    logging::display_banner,
    signals::{setup_signal_handlers, wait_for_signal, ShutdownState},
};
use spacelib_time::{HubExit, SyntheticClock};
use spacelib_vessel::{
    spawn_actuation, RemoteClient, SimulatedRemote, Spacecraft, TimeBase, Vec3,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Event notified when the demo burn finishes.
pub const BURN_COMPLETE: &str = "burn-complete";

/// Runs one spacecraft against the simulated game.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Stop on our own after this long
    duration: Option<Duration>,
}

impl Application {
    /// Loads configuration, applies CLI overrides and validates the result.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Some(period_ms) = args.period_ms {
            config.clock.period_ms = period_ms;
        }

        let duration = match args.duration_s {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Some(Duration::from_secs_f64(secs)),
            Some(secs) => return Err(format!("Invalid duration: {secs}").into()),
            None => None,
        };

        Self::from_config(config, duration)
    }

    /// Builds an application from an already merged configuration.
    pub fn from_config(
        config: AppConfig,
        duration: Option<Duration>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");
        Ok(Self { config, duration })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs until a termination signal, the configured duration, or the loss of the clock.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        display_banner();
        self.log_configuration_summary();

        let shutdown = ShutdownState::new();
        let signal_state = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers(&signal_state).await {
                error!("❌ Failed to set up signal handlers: {e}");
                return;
            }
            // A second signal stops the process without waiting for cleanup.
            if wait_for_signal().await.is_ok() {
                warn!("Shutdown signal received again, exiting immediately");
                std::process::exit(1);
            }
        });

        self.fly(shutdown).await?;
        info!("👋 spacelib shutdown complete");
        Ok(())
    }

    /// Launches the vessel, flies the burn and shuts everything down once `shutdown` fires.
    pub async fn fly(&self, shutdown: ShutdownState) -> Result<HubExit, Box<dyn std::error::Error>> {
        let remote = SimulatedRemote::new(self.config.clock.start_ut, self.config.clock_period());
        let vessel = remote.add_vessel(self.config.vessel.name.as_str());
        remote.add_part(vessel, "engine")?;

        let craft = Arc::new(self.attach(&remote, vessel).await?);
        let engine = craft.part("engine").await?;
        info!("🔩 Found part '{}' (#{})", engine.tag, engine.id);

        let receivers = craft
            .control()
            .take_receivers()
            .ok_or("control receivers already taken")?;
        let mut tasks = spawn_actuation(receivers, Arc::new(remote.actuator(vessel)));
        tasks.push(spawn_reporter(craft.clone(), remote.clone(), self.config.vessel.report_interval_s));
        tasks.push(spawn_burn(craft.clone(), shutdown.clone(), self.config.vessel.burn_s));

        info!("✅ spacelib is running");
        info!("🛑 Press Ctrl+C to shut down");

        let mut clock_lost = craft.timeserver().control_signal();
        let duration = self.duration;
        tokio::select! {
            _ = shutdown.wait() => {}
            _ = clock_lost.closed() => warn!("⚠️ Spacecraft clock stopped on its own"),
            _ = async {
                match duration {
                    Some(d) => tokio::time::sleep(d).await,
                    None => std::future::pending::<()>().await,
                }
            } => info!("⏰ Configured duration elapsed"),
        }
        shutdown.initiate_shutdown();

        info!("🧹 Closing spacecraft '{}'", craft.name().await);
        craft.close();

        info!("⏳ Waiting for helper tasks...");
        for task in tasks {
            match tokio::time::timeout(TASK_DRAIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("❌ Task failed: {}", e),
                Err(_) => warn!("⏰ Task did not finish in time"),
            }
        }

        let exit = match Arc::try_unwrap(craft) {
            Ok(craft) => craft.shutdown().await?,
            Err(shared) => shared.timeserver().join().await?,
        };
        info!("✅ Timeserver stopped: {:?}", exit);
        Ok(exit)
    }

    async fn attach(
        &self,
        remote: &SimulatedRemote,
        vessel: spacelib_vessel::VesselId,
    ) -> Result<Spacecraft, Box<dyn std::error::Error>> {
        let client: Arc<dyn RemoteClient> = Arc::new(remote.clone());
        let craft_config = self.config.spacecraft_config();
        let craft = match self.config.clock.source {
            ClockSource::Synthetic => {
                if craft_config.time_base == TimeBase::MissionElapsed {
                    warn!("⚠️ The synthetic clock follows wall time; mission elapsed time needs simulated_remote");
                }
                let clock = SyntheticClock::new(self.config.clock_period())?;
                let name = client.vessel_name(vessel).await?;
                Spacecraft::with_source(client, vessel, name, clock, craft_config)
            }
            ClockSource::SimulatedRemote => Spacecraft::attach(client, vessel, craft_config).await?,
        };
        Ok(craft)
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  ⏱️ Clock: {:?} every {} ms", self.config.clock.source, self.config.clock.period_ms);
        info!("  🎯 Resolution epsilon: {} s", self.config.clock.resolution_epsilon);
        info!(
            "  🚀 Vessel: '{}' on {} time",
            self.config.vessel.name, self.config.vessel.time_base
        );
        info!("  📊 Report interval: {} s", self.config.vessel.report_interval_s);
        if let Some(d) = self.duration {
            info!("  ⏰ Running for {:.1} s", d.as_secs_f64());
        }
    }
}

/// Logs the clock and the applied controls at most once per `interval` clock seconds.
fn spawn_reporter(craft: Arc<Spacecraft>, remote: SimulatedRemote, interval: f64) -> JoinHandle<()> {
    let mut ticks = craft.periodic(interval);
    tokio::spawn(async move {
        while let Some(time) = ticks.recv().await {
            let label = craft.timeserver().label();
            match remote.controls(craft.id()) {
                Some(c) => info!(
                    "📊 {}={:.2} engaged={} throttle={:.2} direction={}",
                    label, time, c.engaged, c.throttle, c.direction
                ),
                None => info!("📊 {}={:.2}", label, time),
            }
        }
    })
}

/// Full throttle pointing up for `seconds`, then engine off.
fn spawn_burn(craft: Arc<Spacecraft>, shutdown: ShutdownState, seconds: f64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let control = craft.control();
        let commands = control
            .set_engage(true)
            .and_then(|_| control.set_direction(Vec3::new(0.0, 1.0, 0.0)))
            .and_then(|_| control.set_throttle(1.0));
        if let Err(e) = commands {
            warn!("⚠️ Could not start burn: {}", e);
            return;
        }
        info!("🔥 Burn started for {:.1} s", seconds);

        match craft.delay_or_interrupt(seconds, shutdown.wait()).await {
            Ok(span) if span.interrupted => {
                info!("🛑 Burn cut short after {:.2} s", span.elapsed());
            }
            Ok(span) if span.ended => {
                warn!("⚠️ Clock stopped {:.2} s into the burn", span.elapsed());
            }
            Ok(span) => {
                info!("✅ Burn complete after {:.2} s", span.elapsed());
                if let Err(e) = control.set_throttle(0.0) {
                    warn!("⚠️ Could not cut throttle: {}", e);
                }
                craft.notify(BURN_COMPLETE);
            }
            Err(e) => warn!("⚠️ Burn aborted: {}", e),
        }
    })
}
