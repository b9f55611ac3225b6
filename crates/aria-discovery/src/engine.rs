//! Discovery engine: periodic sweep, eviction, pause coordination

use aria_core::{DeviceRecord, DeviceRegistry};
use aria_link::protocol;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use crate::{net, probe};

/// Delay before the device accepts a command on a fresh connection
const IDENTIFY_SETTLE: Duration = Duration::from_millis(100);
/// Deadline for the identification reply
const IDENTIFY_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Malformed address; not retryable without input change
    #[error("invalid device address: {0}")]
    InvalidAddress(String),
    /// Reachability check failed within its timeout
    #[error("device not reachable at {0}")]
    Unreachable(SocketAddr),
    /// Host reachable but no identification reply
    #[error("no identification reply from {0}")]
    NoReply(SocketAddr),
}

/// Sweep and eviction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// TCP port the peripheral listens on
    #[serde(default = "default_service_port")]
    pub service_port: u16,
    /// Seconds between sweeps
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Per-host probe timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    /// Timeout for the manual-add reachability check in milliseconds
    #[serde(default = "default_verify_timeout")]
    pub verify_timeout_ms: u64,
    /// Maximum probes in flight during a sweep
    #[serde(default = "default_concurrency")]
    pub probe_concurrency: usize,
    /// Seconds without a response before a device is marked offline
    #[serde(default = "default_liveness_timeout")]
    pub liveness_timeout_secs: i64,
    /// Seconds without a response before an unconfirmed device is removed
    #[serde(default = "default_removal_timeout")]
    pub removal_timeout_secs: i64,
}

fn default_service_port() -> u16 {
    8080
}

fn default_scan_interval() -> u64 {
    10
}

fn default_probe_timeout() -> u64 {
    1000
}

fn default_verify_timeout() -> u64 {
    3000
}

fn default_concurrency() -> usize {
    50
}

fn default_liveness_timeout() -> i64 {
    30
}

fn default_removal_timeout() -> i64 {
    60
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_port: default_service_port(),
            scan_interval_secs: default_scan_interval(),
            probe_timeout_ms: default_probe_timeout(),
            verify_timeout_ms: default_verify_timeout(),
            probe_concurrency: default_concurrency(),
            liveness_timeout_secs: default_liveness_timeout(),
            removal_timeout_secs: default_removal_timeout(),
        }
    }
}

/// Discovery engine service
///
/// The paused flag has its own lock, separate from the registry: it is
/// polled every tick and must never wait behind a registry mutation.
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    registry: Arc<DeviceRegistry>,
    paused: RwLock<bool>,
    stop: watch::Sender<bool>,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig, registry: Arc<DeviceRegistry>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            config,
            registry,
            paused: RwLock::new(false),
            stop,
        }
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Run the sweep loop until `stop` is called
    ///
    /// One sweep runs immediately; later ticks are skipped while paused,
    /// with no queued catch-up.
    pub async fn run(&self) {
        let mut stopped = self.stop.subscribe();
        if *stopped.borrow() {
            return;
        }

        info!("Device discovery started");
        self.scan_once().await;

        let mut ticker = interval(Duration::from_secs(self.config.scan_interval_secs));
        ticker.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                _ = stopped.changed() => {
                    info!("Device discovery stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if self.is_paused().await {
                        debug!("Scan tick skipped (audio streaming in progress)");
                    } else {
                        self.scan_once().await;
                    }
                }
            }
        }
    }

    /// Cancel the sweep loop; idempotent
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Suppress sweeping while audio is streaming; no-op if already paused
    pub async fn pause(&self) {
        let mut paused = self.paused.write().await;
        if !*paused {
            *paused = true;
            info!("Device scanning paused (audio streaming started)");
        }
    }

    /// Allow sweeping again; no-op if not paused, safe to call speculatively
    pub async fn resume(&self) {
        let mut paused = self.paused.write().await;
        if *paused {
            *paused = false;
            info!("Device scanning resumed (audio streaming ended)");
        }
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.read().await
    }

    /// One full sweep of the local /24 subnet, then the eviction pass
    pub async fn scan_once(&self) {
        let Some(local) = net::local_ipv4() else {
            warn!("Could not determine local address, skipping sweep");
            return;
        };

        let network = net::network_prefix(local);
        debug!(network = %network, "Scanning /24 subnet");

        let hosts = net::host_addrs(network);
        let responsive = probe::sweep(
            &hosts,
            self.config.service_port,
            Duration::from_millis(self.config.probe_timeout_ms),
            self.config.probe_concurrency,
        )
        .await;

        for addr in &responsive {
            self.registry
                .mark_seen(IpAddr::V4(*addr), self.config.service_port)
                .await;
        }

        self.registry
            .evict_stale(
                self.config.liveness_timeout_secs,
                self.config.removal_timeout_secs,
            )
            .await;

        let total = self.registry.len().await;
        info!(
            found = responsive.len(),
            total = total,
            "Network scan completed"
        );
    }

    /// Manually add a device after a bounded reachability check
    pub async fn add_device(
        &self,
        addr: &str,
        port: u16,
        name: &str,
    ) -> Result<DeviceRecord, DiscoveryError> {
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| DiscoveryError::InvalidAddress(addr.to_string()))?;

        let target = SocketAddr::new(addr, port);
        let verify_timeout = Duration::from_millis(self.config.verify_timeout_ms);
        match timeout(verify_timeout, TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => {}
            _ => return Err(DiscoveryError::Unreachable(target)),
        }

        let record = DeviceRecord::manual(addr, port, name.to_string());
        self.registry.insert(record.clone()).await;
        info!(ip = %addr, port = port, name = %record.name, "Manually added device");
        Ok(record)
    }

    /// Remove a device if present; no-op otherwise
    pub async fn remove_device(&self, addr: IpAddr) -> bool {
        self.registry.remove(addr).await
    }

    /// Snapshot of known devices, confirmed devices first
    pub async fn list_devices(&self) -> Vec<DeviceRecord> {
        self.registry.list_ordered().await
    }

    /// Legacy identification exchange
    ///
    /// Sends the discovery probe and waits for the name reply. Not used by
    /// the sweep: firing this at every responsive host made the peripheral
    /// reset, so the sweep records liveness only. Any failure falls back to
    /// the generic seen-update, which never clears a Confirmed kind.
    pub async fn identify_device(
        &self,
        addr: IpAddr,
        port: u16,
    ) -> Result<DeviceRecord, DiscoveryError> {
        let target = SocketAddr::new(addr, port);
        let verify_timeout = Duration::from_millis(self.config.verify_timeout_ms);

        let mut stream = match timeout(verify_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => stream,
            _ => return Err(DiscoveryError::Unreachable(target)),
        };

        // The device needs a moment after accept before it reads commands
        tokio::time::sleep(IDENTIFY_SETTLE).await;

        if stream.write_all(&[protocol::DISCOVERY_PROBE]).await.is_err() {
            self.registry.mark_seen(addr, port).await;
            return Err(DiscoveryError::NoReply(target));
        }

        let mut buf = [0u8; 64];
        let n = match timeout(IDENTIFY_READ_TIMEOUT, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            _ => {
                self.registry.mark_seen(addr, port).await;
                return Err(DiscoveryError::NoReply(target));
            }
        };

        match protocol::decode_discovery_reply(&buf[..n]) {
            Some(name) => {
                info!(ip = %addr, name = %name, "Identified device");
                let record = DeviceRecord::confirmed(addr, port, name);
                self.registry.insert(record.clone()).await;
                Ok(record)
            }
            None => {
                debug!(ip = %addr, "Unexpected identification reply");
                self.registry.mark_seen(addr, port).await;
                Err(DiscoveryError::NoReply(target))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aria_core::DeviceKind;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    fn engine() -> DiscoveryEngine {
        DiscoveryEngine::new(DiscoveryConfig::default(), Arc::new(DeviceRegistry::new()))
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn test_pause_and_resume_are_idempotent() {
        let engine = engine();
        assert!(!engine.is_paused().await);

        engine.pause().await;
        engine.pause().await;
        assert!(engine.is_paused().await);

        engine.resume().await;
        engine.resume().await;
        assert!(!engine.is_paused().await);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let engine = engine();
        engine.stop();
        engine.stop();
    }

    #[tokio::test]
    async fn test_add_device_rejects_malformed_address() {
        let engine = engine();
        let err = engine.add_device("not-an-ip", 8080, "x").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidAddress(_)));
        assert!(engine.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_add_device_rejects_unreachable_host() {
        let engine = engine();
        let (listener, port) = listener().await;
        drop(listener);

        let err = engine
            .add_device("127.0.0.1", port, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_add_device_records_manual_entry() {
        let engine = engine();
        let (_listener, port) = listener().await;

        let record = engine.add_device("127.0.0.1", port, "Bench").await.unwrap();
        assert_eq!(record.kind, DeviceKind::Manual);
        assert!(record.manual);
        assert!(record.online);

        let listed = engine.list_devices().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Bench");
    }

    #[tokio::test]
    async fn test_remove_device_is_noop_when_absent() {
        let engine = engine();
        assert!(!engine
            .remove_device(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await);
    }

    #[tokio::test]
    async fn test_identify_device_confirms_record() {
        let engine = engine();
        let (listener, port) = listener().await;

        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut cmd = [0u8; 1];
            conn.read_exact(&mut cmd).await.unwrap();
            assert_eq!(cmd[0], protocol::DISCOVERY_PROBE);

            let mut reply = vec![protocol::DISCOVERY_REPLY];
            reply.extend_from_slice(b"Living Room Speaker");
            conn.write_all(&reply).await.unwrap();
        });

        let record = engine
            .identify_device(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
            .await
            .unwrap();
        assert_eq!(record.kind, DeviceKind::Confirmed);
        assert_eq!(record.name, "Living Room Speaker");
    }

    #[tokio::test]
    async fn test_identify_device_falls_back_to_seen_update() {
        let engine = engine();
        let (listener, port) = listener().await;

        tokio::spawn(async move {
            // Accept the probe but close without replying
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut cmd = [0u8; 1];
            let _ = conn.read_exact(&mut cmd).await;
        });

        let addr = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let err = engine.identify_device(addr, port).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NoReply(_)));

        // The host is still recorded as seen, just unidentified
        let record = engine.registry().get(addr).await.unwrap();
        assert_eq!(record.kind, DeviceKind::Unknown);
        assert!(record.online);
    }

    #[tokio::test]
    async fn test_sweep_result_yields_single_unknown_record() {
        let engine = engine();
        let (_listener, port) = listener().await;

        let hosts = vec![Ipv4Addr::LOCALHOST, Ipv4Addr::new(127, 1, 2, 3)];
        let responsive = probe::sweep(&hosts, port, Duration::from_millis(500), 50).await;
        for addr in &responsive {
            engine.registry().mark_seen(IpAddr::V4(*addr), port).await;
        }

        let listed = engine.list_devices().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, DeviceKind::Unknown);
        assert!(listed[0].online);
    }
}
