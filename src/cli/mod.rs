pub mod config;

use clap::builder::BoolishValueParser;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Every setting is optional here; unset values fall through to the config
/// file and then to built-in defaults.
#[derive(Parser, Debug, Default)]
#[command(name = "aprs2influx")]
#[command(about = "Store APRS-IS packets in InfluxDB as line protocol")]
#[command(version)]
pub struct Cli {
    /// TOML config file with [aprs] and [influxdb] sections
    #[arg(long, env = "APRS2INFLUX_CONFIG")]
    pub config: Option<PathBuf>,

    /// APRS-IS server host
    #[arg(long, env = "APRS_SERVER")]
    pub host: Option<String>,

    /// APRS-IS server port
    #[arg(long, env = "APRS_PORT")]
    pub port: Option<u16>,

    /// Callsign to log in and send heartbeats with
    #[arg(long, env = "APRS_CALLSIGN")]
    pub callsign: Option<String>,

    /// APRS-IS server-side filter, e.g. "r/33/-112/50"
    #[arg(long, env = "APRS_FILTER")]
    pub filter: Option<String>,

    /// Heartbeat interval in minutes (fractions allowed)
    #[arg(long, env = "APRS_HEARTBEAT_INTERVAL")]
    pub interval: Option<f64>,

    /// InfluxDB host
    #[arg(long, env = "INFLUXDB_HOST")]
    pub dbhost: Option<String>,

    /// InfluxDB port
    #[arg(long, env = "INFLUXDB_PORT")]
    pub dbport: Option<u16>,

    /// InfluxDB username
    #[arg(long, env = "INFLUXDB_USERNAME")]
    pub dbuser: Option<String>,

    /// InfluxDB password
    #[arg(long, env = "INFLUXDB_PASSWORD", hide_env_values = true)]
    pub dbpassword: Option<String>,

    /// InfluxDB database
    #[arg(long, env = "INFLUXDB_DATABASE")]
    pub dbname: Option<String>,

    /// Use HTTPS for InfluxDB
    #[arg(
        long,
        env = "INFLUXDB_SSL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub dbssl: Option<bool>,

    /// InfluxDB API token; replaces basic auth when set
    #[arg(long, env = "INFLUXDB_TOKEN", hide_env_values = true)]
    pub dbtoken: Option<String>,

    /// InfluxDB write timeout in seconds
    #[arg(long, env = "INFLUXDB_TIMEOUT")]
    pub dbtimeout: Option<f64>,

    /// Enable debug logging
    #[arg(
        long,
        env = "DEBUG",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub debug: Option<bool>,
}

/// Install the global tracing subscriber. `RUST_LOG` wins when set;
/// otherwise `debug` selects between debug and warn.
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true))
        .with(filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "aprs2influx",
            "--host",
            "euro.aprs2.net",
            "--port",
            "14580",
            "--interval",
            "0.5",
            "--dbssl",
            "--debug",
            "false",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("euro.aprs2.net"));
        assert_eq!(cli.port, Some(14580));
        assert_eq!(cli.interval, Some(0.5));
        assert_eq!(cli.dbssl, Some(true));
        assert_eq!(cli.debug, Some(false));
    }

    #[test]
    fn rejects_bad_port() {
        assert!(Cli::try_parse_from(["aprs2influx", "--port", "not-a-port"]).is_err());
    }
}
