//! InfluxDB 1.x-style `/write` endpoint over HTTP.

use super::{RecordSink, SinkConnector, SinkError};
use crate::log::Logger;
use crate::{log_debug, log_info};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, PartialEq)]
pub struct InfluxSettings {
    pub host: String,
    pub port: u16,
    pub ssl: bool,
    pub username: String,
    pub password: String,
    pub database: String,
    /// When set, sent as `Authorization: Token <token>` instead of basic auth.
    pub token: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl", &self.ssl)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl InfluxSettings {
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn write_url(&self) -> Result<Url, SinkError> {
        Url::parse_with_params(
            &format!("{}/write", self.base_url()),
            &[("db", self.database.as_str())],
        )
        .map_err(|e| SinkError::Config(format!("invalid InfluxDB URL: {}", e)))
    }
}

pub struct InfluxConnector {
    settings: InfluxSettings,
    logger: Arc<dyn Logger>,
}

impl InfluxConnector {
    pub fn new(settings: InfluxSettings, logger: Arc<dyn Logger>) -> Self {
        Self { settings, logger }
    }
}

#[async_trait]
impl SinkConnector for InfluxConnector {
    /// Builds the HTTP client; no request is made until the first write.
    async fn connect(&self) -> Result<Arc<dyn RecordSink>, SinkError> {
        let client = Client::builder()
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| SinkError::Config(format!("failed to build HTTP client: {}", e)))?;
        let write_url = self.settings.write_url()?;
        log_info!(
            self.logger,
            "InfluxDB writer ready for {} (database {})",
            self.settings.base_url(),
            self.settings.database
        );

        let writer: Arc<dyn RecordSink> = Arc::new(InfluxWriter {
            client,
            write_url,
            auth: Auth::from_settings(&self.settings),
            closed: AtomicBool::new(false),
            logger: Arc::clone(&self.logger),
        });
        Ok(writer)
    }
}

enum Auth {
    Basic { username: String, password: String },
    Token(String),
}

impl Auth {
    fn from_settings(settings: &InfluxSettings) -> Self {
        match &settings.token {
            Some(token) => Auth::Token(token.clone()),
            None => Auth::Basic {
                username: settings.username.clone(),
                password: settings.password.clone(),
            },
        }
    }
}

struct InfluxWriter {
    client: Client,
    write_url: Url,
    auth: Auth,
    closed: AtomicBool,
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl RecordSink for InfluxWriter {
    async fn write(&self, line: &str) -> Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        let request = self
            .client
            .post(self.write_url.clone())
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line.to_string());
        let request = match &self.auth {
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Token(token) => request.header("Authorization", format!("Token {}", token)),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SinkError::Timeout
            } else {
                SinkError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "(failed to read body)".to_string());
        log_debug!(self.logger, "InfluxDB returned HTTP {}: {}", status, body);
        Err(classify(status, body))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            log_info!(self.logger, "InfluxDB writer closed");
        }
    }
}

/// Non-2xx status to error: 5xx is the server's fault, anything else the request's.
fn classify(status: u16, body: String) -> SinkError {
    if status >= 500 {
        SinkError::Server { status, body }
    } else {
        SinkError::Client { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> InfluxSettings {
        InfluxSettings {
            host: "influxdb".into(),
            port: 8086,
            ssl: false,
            username: "aprs2influxdb".into(),
            password: "secret".into(),
            database: "aprs db".into(),
            token: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn write_url_encodes_database() {
        let url = settings().write_url().unwrap();
        assert_eq!(url.as_str(), "http://influxdb:8086/write?db=aprs+db");

        let tls = InfluxSettings {
            ssl: true,
            ..settings()
        };
        assert!(tls.base_url().starts_with("https://"));
    }

    #[test]
    fn status_classification() {
        assert!(matches!(classify(400, String::new()), SinkError::Client { status: 400, .. }));
        assert!(matches!(classify(404, String::new()), SinkError::Client { .. }));
        assert!(matches!(classify(500, String::new()), SinkError::Server { status: 500, .. }));
        assert!(matches!(classify(503, String::new()), SinkError::Server { .. }));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!(
            "{:?}",
            InfluxSettings {
                token: Some("tok".into()),
                ..settings()
            }
        );
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("tok\""));
        assert!(rendered.contains("<redacted>"));
    }

    #[tokio::test]
    async fn closed_writer_rejects_writes() {
        let connector = InfluxConnector::new(settings(), Arc::new(crate::log::NoOpLogger));
        let sink = connector.connect().await.unwrap();
        sink.close().await;
        sink.close().await;
        assert_eq!(sink.write("packet x=1").await, Err(SinkError::Closed));
    }
}
