//! Device types for tracking discovered peripherals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// How a device's identity was established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Host responded on the service port but was never identified
    Unknown,
    /// Identity confirmed via the discovery exchange
    Confirmed,
    /// Added by the user, bypassing discovery
    Manual,
}

impl Default for DeviceKind {
    fn default() -> Self {
        Self::Unknown
    }
}

/// A device tracked by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Human-readable name (reported by the device or user-assigned)
    pub name: String,
    /// IP address, the registry key
    #[serde(rename = "ip")]
    pub addr: IpAddr,
    /// TCP service port
    pub port: u16,
    /// Identity classification
    pub kind: DeviceKind,
    /// When the device last responded to a probe
    pub last_seen: DateTime<Utc>,
    /// Whether the device is currently considered reachable
    pub online: bool,
    /// Manually added devices are exempt from eviction
    pub manual: bool,
}

impl DeviceRecord {
    /// Create a record for a host that answered a sweep probe
    pub fn probed(addr: IpAddr, port: u16) -> Self {
        Self {
            name: format!("Device (port {})", port),
            addr,
            port,
            kind: DeviceKind::Unknown,
            last_seen: Utc::now(),
            online: true,
            manual: false,
        }
    }

    /// Create a record for a manually added device
    pub fn manual(addr: IpAddr, port: u16, name: String) -> Self {
        let name = if name.is_empty() {
            "Manual Device".to_string()
        } else {
            name
        };
        Self {
            name,
            addr,
            port,
            kind: DeviceKind::Manual,
            last_seen: Utc::now(),
            online: true,
            manual: true,
        }
    }

    /// Create a record for a device that completed the identification exchange
    pub fn confirmed(addr: IpAddr, port: u16, name: String) -> Self {
        Self {
            name,
            addr,
            port,
            kind: DeviceKind::Confirmed,
            last_seen: Utc::now(),
            online: true,
            manual: false,
        }
    }

    /// Refresh the liveness fields, preserving identity
    pub fn touch(&mut self) {
        self.last_seen = Utc::now();
        self.online = true;
    }

    /// Check whether the device has not been seen for `timeout_secs`
    pub fn is_stale(&self, timeout_secs: i64) -> bool {
        let elapsed = Utc::now() - self.last_seen;
        elapsed.num_seconds() > timeout_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, 100))
    }

    #[test]
    fn test_probed_record() {
        let record = DeviceRecord::probed(addr(), 8080);
        assert_eq!(record.kind, DeviceKind::Unknown);
        assert_eq!(record.name, "Device (port 8080)");
        assert!(record.online);
        assert!(!record.manual);
    }

    #[test]
    fn test_manual_record_default_name() {
        let record = DeviceRecord::manual(addr(), 8080, String::new());
        assert_eq!(record.name, "Manual Device");
        assert_eq!(record.kind, DeviceKind::Manual);
        assert!(record.manual);
    }

    #[test]
    fn test_staleness() {
        let mut record = DeviceRecord::probed(addr(), 8080);
        assert!(!record.is_stale(30));
        record.last_seen = Utc::now() - chrono::Duration::seconds(45);
        assert!(record.is_stale(30));
        assert!(!record.is_stale(60));
    }

    #[test]
    fn test_json_shape() {
        let record = DeviceRecord::probed(addr(), 8080);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["ip"], "192.168.1.100");
        assert_eq!(value["kind"], "unknown");
        assert_eq!(value["online"], true);
    }
}
