//! The single active peripheral session
//!
//! At most one session exists at a time. Replacing or clearing it shuts the
//! socket down and aborts the telemetry reader before the new session is
//! installed, so two readers can never overlap.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::LinkError;
use crate::protocol::{self, TELEMETRY_FRAME_LEN};
use crate::telemetry::AlertBroadcast;

/// Bound on opening the transport
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-attempt bound on a telemetry read; an idle link is torn down
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

struct Session {
    peer: SocketAddr,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Session {
    async fn close(mut self) {
        let _ = self.writer.shutdown().await;
        self.reader.abort();
        info!(peer = %self.peer, "Session closed");
    }
}

/// Owner of the single active transport connection to a peripheral
pub struct SessionManager {
    session: Mutex<Option<Session>>,
    alerts: Arc<AlertBroadcast>,
}

impl SessionManager {
    pub fn new(alerts: Arc<AlertBroadcast>) -> Self {
        Self {
            session: Mutex::new(None),
            alerts,
        }
    }

    /// Open a session, replacing and closing any existing one
    ///
    /// No identification handshake is attempted on connect; the peripheral
    /// firmware resets when probed, so the link goes straight to streaming.
    pub async fn connect(&self, addr: IpAddr, port: u16) -> Result<(), LinkError> {
        let peer = SocketAddr::new(addr, port);
        let mut session = self.session.lock().await;

        if let Some(old) = session.take() {
            old.close().await;
        }

        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(peer))
            .await
            .map_err(|_| {
                LinkError::Connect(
                    peer,
                    std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
                )
            })?
            .map_err(|e| LinkError::Connect(peer, e))?;

        let (read_half, write_half) = stream.into_split();
        let reader = tokio::spawn(read_telemetry(read_half, Arc::clone(&self.alerts)));

        *session = Some(Session {
            peer,
            writer: write_half,
            reader,
        });

        info!(peer = %peer, "Connected to peripheral");
        Ok(())
    }

    /// Close and clear the current session; no-op without one
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        if let Some(old) = session.take() {
            old.close().await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Address of the connected peripheral, if any
    pub async fn peer(&self) -> Option<SocketAddr> {
        self.session.lock().await.as_ref().map(|s| s.peer)
    }

    /// Write one framed command to the current session
    ///
    /// After an I/O error the session is likely dead; callers in a streaming
    /// sequence must treat the failure as terminating that sequence.
    pub async fn send_command(&self, opcode: u8, payload: &[u8]) -> Result<(), LinkError> {
        let mut session = self.session.lock().await;
        let session = session.as_mut().ok_or(LinkError::NotConnected)?;

        let frame = protocol::encode_command(opcode, payload);
        session.writer.write_all(&frame).await?;
        Ok(())
    }
}

/// Read fixed-size telemetry frames until the link dies or goes idle
async fn read_telemetry(mut reader: OwnedReadHalf, alerts: Arc<AlertBroadcast>) {
    debug!("Telemetry reader started");
    let mut frame = [0u8; TELEMETRY_FRAME_LEN];

    loop {
        match timeout(READ_TIMEOUT, reader.read_exact(&mut frame)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!(error = %e, "Telemetry reader stopped");
                return;
            }
            Err(_) => {
                debug!("Telemetry read timed out, reader stopped");
                return;
            }
        }

        match protocol::decode_telemetry(&frame) {
            Some(alert) => {
                info!(
                    kind = ?alert.kind,
                    temperature = alert.temperature,
                    "Temperature telemetry"
                );
                alerts.publish(alert);
            }
            None => {
                debug!(opcode = frame[0], "Ignoring unrecognized inbound frame");
            }
        }
    }
}
