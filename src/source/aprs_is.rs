//! APRS-IS TCP client.

use super::{decode, PacketSource, SourceConnector, SourceError};
use crate::log::Logger;
use crate::packet::Packet;
use crate::{log_debug, log_info, log_trace};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

const SOFTWARE: &str = "aprs2influx";

/// APRS-IS passcode for `callsign`. The SSID is ignored.
pub fn passcode(callsign: &str) -> u16 {
    let base = callsign.split('-').next().unwrap_or(callsign).to_ascii_uppercase();
    let hash = base.bytes().enumerate().fold(0x73e2u16, |hash, (i, b)| {
        if i % 2 == 0 {
            hash ^ (u16::from(b) << 8)
        } else {
            hash ^ u16::from(b)
        }
    });
    hash & 0x7fff
}

#[derive(Debug, Clone, PartialEq)]
pub struct AprsIsSettings {
    pub server: String,
    pub port: u16,
    pub callsign: String,
    /// Server-side filter expression; empty means none.
    pub filter: String,
}

impl AprsIsSettings {
    pub fn login_line(&self) -> String {
        let callsign = self.callsign.to_ascii_uppercase();
        let mut line = format!(
            "user {} pass {} vers {} {}",
            callsign,
            passcode(&callsign),
            SOFTWARE,
            env!("CARGO_PKG_VERSION")
        );
        if !self.filter.trim().is_empty() {
            line.push_str(" filter ");
            line.push_str(self.filter.trim());
        }
        line
    }
}

/// Checks a `# logresp CALL verified, server NAME` line.
fn check_logresp(line: &str) -> Result<(), SourceError> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("#") || parts.next() != Some("logresp") {
        return Err(SourceError::Login(format!("unexpected response: {}", line)));
    }
    let _callsign = parts.next();
    match parts.next().map(|s| s.trim_end_matches(',')) {
        Some("verified") => Ok(()),
        _ => Err(SourceError::Login(line.to_string())),
    }
}

pub struct AprsIsConnector {
    settings: AprsIsSettings,
    logger: Arc<dyn Logger>,
}

impl AprsIsConnector {
    pub fn new(settings: AprsIsSettings, logger: Arc<dyn Logger>) -> Self {
        Self { settings, logger }
    }
}

#[async_trait]
impl SourceConnector for AprsIsConnector {
    async fn connect(&self) -> Result<Arc<dyn PacketSource>, SourceError> {
        let addr = format!("{}:{}", self.settings.server, self.settings.port);
        log_info!(self.logger, "connecting to APRS-IS at {}", addr);

        let stream = TcpStream::connect(&addr).await?;
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        let banner = read_line(&mut reader).await?.ok_or(SourceError::Disconnected)?;
        log_debug!(self.logger, "server banner: {}", banner);

        let login = self.settings.login_line();
        write.write_all(format!("{}\r\n", login).as_bytes()).await?;
        write.flush().await?;

        let response = read_line(&mut reader).await?.ok_or(SourceError::Disconnected)?;
        check_logresp(&response)?;
        log_info!(self.logger, "logged in to {}: {}", addr, response);

        let (closed, _) = watch::channel(false);
        let connection: Arc<dyn PacketSource> = Arc::new(AprsIsConnection {
            reader: Mutex::new(reader),
            writer: Mutex::new(write),
            closed,
            logger: Arc::clone(&self.logger),
        });
        Ok(connection)
    }
}

/// Logged-in connection. Reads and writes use separate halves and locks.
struct AprsIsConnection {
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    closed: watch::Sender<bool>,
    logger: Arc<dyn Logger>,
}

impl AprsIsConnection {
    fn mark_closed(&self) -> bool {
        !self.closed.send_replace(true)
    }
}

#[async_trait]
impl PacketSource for AprsIsConnection {
    async fn recv(&self) -> Result<Packet, SourceError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(SourceError::Closed);
        }
        let mut reader = self.reader.lock().await;

        loop {
            let line = tokio::select! {
                line = read_line(&mut *reader) => line?,
                _ = closed.wait_for(|closed| *closed) => return Err(SourceError::Closed),
            };
            let Some(line) = line else {
                self.mark_closed();
                log_info!(self.logger, "APRS-IS server closed the connection");
                return Err(SourceError::Disconnected);
            };

            if line.is_empty() || line.starts_with('#') {
                log_trace!(self.logger, "server: {}", line);
                continue;
            }
            match decode(&line) {
                Ok(packet) => return Ok(packet),
                Err(e) => log_debug!(self.logger, "skipping {:?}: {}", line, e),
            }
        }
    }

    async fn send_line(&self, line: &str) -> Result<(), SourceError> {
        if self.is_closed() {
            return Err(SourceError::Closed);
        }
        let mut writer = self.writer.lock().await;
        writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&self) {
        if self.mark_closed() {
            let _ = self.writer.lock().await.shutdown().await;
            log_info!(self.logger, "APRS-IS connection closed");
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// One line without its terminator, decoded lossily. `None` at EOF.
async fn read_line<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(&buf);
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
