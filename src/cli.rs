//! Command-line arguments

use std::path::PathBuf;

use clap::Parser;

/// Exports Dyson Pure Cool / Hot+Cool statistics as Prometheus metrics.
#[derive(Parser, Debug)]
#[command(name = "dyson-exporter")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// HTTP server port (overrides the config file; default 9034).
    #[arg(long)]
    pub port: Option<u16>,

    /// Configuration file (INI).
    #[arg(long, default_value = "/config/config.ini")]
    pub config: PathBuf,

    /// Logging level. RUST_LOG takes precedence when set.
    #[arg(
        long,
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Only monitor devices marked as active (overrides the config file).
    #[arg(long)]
    pub only_active_devices: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["dyson-exporter"]).unwrap();
        assert_eq!(args.port, None);
        assert_eq!(args.config, PathBuf::from("/config/config.ini"));
        assert_eq!(args.log_level, "info");
        assert_eq!(args.only_active_devices, None);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "dyson-exporter",
            "--port",
            "9100",
            "--config",
            "./config.ini",
            "--log-level",
            "debug",
            "--only-active-devices",
            "false",
        ])
        .unwrap();
        assert_eq!(args.port, Some(9100));
        assert_eq!(args.config, PathBuf::from("./config.ini"));
        assert_eq!(args.log_level, "debug");
        assert_eq!(args.only_active_devices, Some(false));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Args::try_parse_from(["dyson-exporter", "--log-level", "LOUD"]).is_err());
        assert!(Args::try_parse_from(["dyson-exporter", "--port", "70000"]).is_err());
    }
}
