//! Command-line interface handling for the spacelib runner.
//!
//! Every option here overrides the matching setting from the TOML file.

use clap::{Arg, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the clock period in milliseconds
    pub period_ms: Option<u64>,
    /// Stop on its own after this many seconds
    pub duration_s: Option<f64>,
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list. Exits the process on invalid input, like [`CliArgs::parse`].
    pub fn parse_from<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_matches(&command().get_matches_from(args))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("spacelib.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            period_ms: matches.get_one::<u64>("period-ms").copied(),
            duration_s: matches.get_one::<f64>("duration").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("spacelib")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Universal-time broadcast and vessel control against a simulated game")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("spacelib.toml"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("period-ms")
                .short('p')
                .long("period-ms")
                .value_name("MS")
                .help("Clock sampling period in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("Shut down after this many seconds instead of waiting for Ctrl+C")
                .value_parser(clap::value_parser!(f64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_arguments() {
        let args = CliArgs::parse_from(["spacelib"]);
        assert_eq!(args.config_path, PathBuf::from("spacelib.toml"));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.period_ms, None);
        assert_eq!(args.duration_s, None);
    }

    #[test]
    fn overrides_are_parsed() {
        let args = CliArgs::parse_from([
            "spacelib",
            "--config",
            "flight.toml",
            "-l",
            "debug",
            "--json-logs",
            "--period-ms",
            "20",
            "--duration",
            "1.5",
        ]);
        assert_eq!(args.config_path, PathBuf::from("flight.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.period_ms, Some(20));
        assert_eq!(args.duration_s, Some(1.5));
    }
}
