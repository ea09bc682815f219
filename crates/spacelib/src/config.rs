//! Configuration management for the spacelib runner.
//!
//! Settings are loaded from a TOML file; a default file is written when the
//! path does not exist yet.

use serde::{Deserialize, Serialize};
use spacelib_time::DEFAULT_RESOLUTION_EPSILON;
use spacelib_vessel::{SpacecraftConfig, TimeBase};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

fn default_period_ms() -> u64 {
    5
}

fn default_resolution_epsilon() -> f64 {
    DEFAULT_RESOLUTION_EPSILON
}

fn default_vessel_name() -> String {
    "Untitled Space Craft".to_string()
}

fn default_report_interval_s() -> f64 {
    1.0
}

fn default_burn_s() -> f64 {
    2.0
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream clock settings
    #[serde(default)]
    pub clock: ClockSettings,
    /// The simulated vessel
    #[serde(default)]
    pub vessel: VesselSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Where universal time comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockSource {
    /// Local wall clock sampled every `period_ms`
    #[default]
    Synthetic,
    /// Value stream pushed by the simulated game
    SimulatedRemote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSettings {
    #[serde(default)]
    pub source: ClockSource,
    /// Sampling or streaming period in milliseconds
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Slack the delay primitive allows for, in seconds
    #[serde(default = "default_resolution_epsilon")]
    pub resolution_epsilon: f64,
    /// Universal time the simulated game starts at
    #[serde(default)]
    pub start_ut: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselSettings {
    #[serde(default = "default_vessel_name")]
    pub name: String,
    /// Clock the vessel's timeserver follows
    #[serde(default)]
    pub time_base: TimeBase,
    /// Minimum gap between status reports, in clock seconds
    #[serde(default = "default_report_interval_s")]
    pub report_interval_s: f64,
    /// Length of the demo engine burn, in clock seconds
    #[serde(default = "default_burn_s")]
    pub burn_s: f64,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file that receives a copy of the log output
    pub file_path: Option<String>,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            source: ClockSource::default(),
            period_ms: default_period_ms(),
            resolution_epsilon: default_resolution_epsilon(),
            start_ut: 0.0,
        }
    }
}

impl Default for VesselSettings {
    fn default() -> Self {
        Self {
            name: default_vessel_name(),
            time_base: TimeBase::default(),
            report_interval_s: default_report_interval_s(),
            burn_s: default_burn_s(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_path: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating it with defaults if missing.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn clock_period(&self) -> Duration {
        Duration::from_millis(self.clock.period_ms)
    }

    /// Timeserver settings for the configured vessel.
    pub fn spacecraft_config(&self) -> SpacecraftConfig {
        SpacecraftConfig {
            time_base: self.vessel.time_base,
            resolution_epsilon: self.clock.resolution_epsilon,
        }
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.clock.period_ms == 0 {
            return Err("clock.period_ms must be greater than 0".to_string());
        }

        let epsilon = self.clock.resolution_epsilon;
        if !epsilon.is_finite() || epsilon < 0.0 {
            return Err(format!(
                "clock.resolution_epsilon must be a non-negative number, got {epsilon}"
            ));
        }

        if !self.clock.start_ut.is_finite() {
            return Err("clock.start_ut must be a finite number".to_string());
        }

        if self.vessel.name.trim().is_empty() {
            return Err("vessel.name cannot be empty".to_string());
        }

        let interval = self.vessel.report_interval_s;
        if !interval.is_finite() || interval <= 0.0 {
            return Err(format!(
                "vessel.report_interval_s must be greater than 0, got {interval}"
            ));
        }

        let burn = self.vessel.burn_s;
        if !burn.is_finite() || burn < 0.0 {
            return Err(format!("vessel.burn_s must be a non-negative number, got {burn}"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
