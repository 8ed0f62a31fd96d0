use super::Cli;
use crate::coordinator::CoordinatorSettings;
use crate::sink::InfluxSettings;
use crate::source::AprsIsSettings;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "rotate.aprs.net";
pub const DEFAULT_PORT: u16 = 10152;
pub const DEFAULT_CALLSIGN: &str = "nocall";
pub const DEFAULT_INTERVAL_MINUTES: f64 = 60.0;
pub const DEFAULT_DB_HOST: &str = "influxdb";
pub const DEFAULT_DB_PORT: u16 = 8086;
pub const DEFAULT_DB_USER: &str = "aprs2influxdb";
pub const DEFAULT_DB_PASSWORD: &str = "aprs2influxdb";
pub const DEFAULT_DB_NAME: &str = "aprs2influxdb";
pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;

/// Shape of the optional TOML file. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub aprs: AprsSection,
    #[serde(default)]
    pub influxdb: InfluxSection,
    #[serde(default)]
    pub debug: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AprsSection {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub callsign: Option<String>,
    pub filter: Option<String>,
    pub heartbeat_interval_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub ssl: Option<bool>,
    pub token: Option<String>,
    pub timeout_secs: Option<f64>,
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}

/// Fully resolved settings. `Debug` output keeps secrets redacted.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub aprs: AprsIsSettings,
    pub heartbeat_interval: Duration,
    pub influxdb: InfluxSettings,
    pub debug: bool,
}

impl Config {
    /// Defaults < `--config` file < environment < flags.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => load_config_from_path(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Layer already-parsed arguments over a file config.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self> {
        let FileConfig {
            aprs,
            influxdb,
            debug,
        } = file;

        let interval_minutes = cli
            .interval
            .or(aprs.heartbeat_interval_minutes)
            .unwrap_or(DEFAULT_INTERVAL_MINUTES);
        let heartbeat_interval = positive_duration(interval_minutes * 60.0).with_context(|| {
            format!(
                "heartbeat interval must be a positive number of minutes, got {}",
                interval_minutes
            )
        })?;

        let timeout_secs = cli
            .dbtimeout
            .or(influxdb.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let timeout = positive_duration(timeout_secs).with_context(|| {
            format!(
                "InfluxDB timeout must be a positive number of seconds, got {}",
                timeout_secs
            )
        })?;

        // login and heartbeat must present the same callsign
        let callsign = pick(&cli.callsign, aprs.callsign, DEFAULT_CALLSIGN).to_ascii_uppercase();
        if callsign.trim().is_empty() {
            bail!("callsign must not be empty");
        }

        Ok(Self {
            aprs: AprsIsSettings {
                server: pick(&cli.host, aprs.server, DEFAULT_SERVER),
                port: cli.port.or(aprs.port).unwrap_or(DEFAULT_PORT),
                callsign,
                filter: pick(&cli.filter, aprs.filter, ""),
            },
            heartbeat_interval,
            influxdb: InfluxSettings {
                host: pick(&cli.dbhost, influxdb.host, DEFAULT_DB_HOST),
                port: cli.dbport.or(influxdb.port).unwrap_or(DEFAULT_DB_PORT),
                ssl: cli.dbssl.or(influxdb.ssl).unwrap_or(false),
                username: pick(&cli.dbuser, influxdb.username, DEFAULT_DB_USER),
                password: pick(&cli.dbpassword, influxdb.password, DEFAULT_DB_PASSWORD),
                database: pick(&cli.dbname, influxdb.database, DEFAULT_DB_NAME),
                token: cli
                    .dbtoken
                    .clone()
                    .or(influxdb.token)
                    .filter(|t| !t.is_empty()),
                timeout,
            },
            debug: cli.debug.or(debug).unwrap_or(false),
        })
    }

    pub fn coordinator(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            callsign: self.aprs.callsign.clone(),
            heartbeat_interval: self.heartbeat_interval,
        }
    }
}

/// `None` for zero, negative, NaN or out-of-range seconds.
fn positive_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
}

fn pick(flag: &Option<String>, file: Option<String>, default: &str) -> String {
    flag.clone()
        .or(file)
        .unwrap_or_else(|| default.to_string())
}
