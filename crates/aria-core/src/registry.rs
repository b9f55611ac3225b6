//! Shared device registry with liveness-based eviction
//!
//! The registry is the single source of truth for known devices. Writers are
//! the discovery sweep and manual add/remove; readers are the device list and
//! lookup paths. Probe results are computed outside the write lock and only
//! applied under it.

use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::device::{DeviceKind, DeviceRecord};

/// Registry of known devices, keyed by address
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<IpAddr, DeviceRecord>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of a single record
    pub async fn get(&self, addr: IpAddr) -> Option<DeviceRecord> {
        self.devices.read().await.get(&addr).cloned()
    }

    /// Insert or replace a record wholesale
    pub async fn insert(&self, record: DeviceRecord) {
        self.devices.write().await.insert(record.addr, record);
    }

    /// Record that a host answered a sweep probe
    ///
    /// Existing records keep their identity fields; only the liveness fields
    /// are refreshed. A previously Confirmed device is never downgraded by an
    /// unidentified probe.
    pub async fn mark_seen(&self, addr: IpAddr, port: u16) {
        let mut devices = self.devices.write().await;
        match devices.get_mut(&addr) {
            Some(record) => record.touch(),
            None => {
                info!(ip = %addr, port = port, "Found device");
                devices.insert(addr, DeviceRecord::probed(addr, port));
            }
        }
    }

    /// Remove a record, returning true if it existed
    pub async fn remove(&self, addr: IpAddr) -> bool {
        let removed = self.devices.write().await.remove(&addr);
        if let Some(record) = &removed {
            info!(ip = %addr, name = %record.name, "Device removed from registry");
        }
        removed.is_some()
    }

    /// Snapshot of all records in no particular order
    pub async fn list(&self) -> Vec<DeviceRecord> {
        self.devices.read().await.values().cloned().collect()
    }

    /// Snapshot with Confirmed devices first, all others after
    pub async fn list_ordered(&self) -> Vec<DeviceRecord> {
        let devices = self.devices.read().await;
        let mut confirmed = Vec::new();
        let mut others = Vec::new();
        for record in devices.values() {
            if record.kind == DeviceKind::Confirmed {
                confirmed.push(record.clone());
            } else {
                others.push(record.clone());
            }
        }
        confirmed.extend(others);
        confirmed
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Run the eviction pass
    ///
    /// Records not seen for `liveness_secs` are marked offline. Records not
    /// seen for `removal_secs` are deleted unless Confirmed. Manual records
    /// are skipped entirely; Confirmed records are kept offline indefinitely
    /// so a known peripheral can reappear after transient network noise.
    pub async fn evict_stale(&self, liveness_secs: i64, removal_secs: i64) {
        let mut devices = self.devices.write().await;
        devices.retain(|addr, record| {
            if record.manual {
                return true;
            }
            if record.is_stale(liveness_secs) {
                if record.online {
                    info!(ip = %addr, name = %record.name, "Device marked offline");
                    record.online = false;
                }
                if record.is_stale(removal_secs) && record.kind != DeviceKind::Confirmed {
                    debug!(ip = %addr, name = %record.name, "Removing stale device");
                    return false;
                }
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::net::Ipv4Addr;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(192, 168, 1, last))
    }

    async fn backdate(registry: &DeviceRegistry, addr: IpAddr, secs: i64) {
        let mut record = registry.get(addr).await.unwrap();
        record.last_seen = Utc::now() - chrono::Duration::seconds(secs);
        registry.insert(record).await;
    }

    #[tokio::test]
    async fn test_mark_seen_creates_unknown_record() {
        let registry = DeviceRegistry::new();
        registry.mark_seen(addr(10), 8080).await;

        let record = registry.get(addr(10)).await.unwrap();
        assert_eq!(record.kind, DeviceKind::Unknown);
        assert!(record.online);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_mark_seen_preserves_identity() {
        let registry = DeviceRegistry::new();
        registry
            .insert(DeviceRecord::confirmed(addr(10), 8080, "Speaker".into()))
            .await;

        registry.mark_seen(addr(10), 8080).await;

        let record = registry.get(addr(10)).await.unwrap();
        assert_eq!(record.kind, DeviceKind::Confirmed);
        assert_eq!(record.name, "Speaker");
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_is_noop_when_absent() {
        let registry = DeviceRegistry::new();
        assert!(!registry.remove(addr(10)).await);

        registry.mark_seen(addr(10), 8080).await;
        assert!(registry.remove(addr(10)).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_ordered_confirmed_first() {
        let registry = DeviceRegistry::new();
        registry.mark_seen(addr(1), 8080).await;
        registry
            .insert(DeviceRecord::confirmed(addr(2), 8080, "Speaker".into()))
            .await;
        registry
            .insert(DeviceRecord::manual(addr(3), 8080, "Bench".into()))
            .await;

        let list = registry.list_ordered().await;
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].kind, DeviceKind::Confirmed);
    }

    #[tokio::test]
    async fn test_eviction_marks_offline_after_liveness_timeout() {
        let registry = DeviceRegistry::new();
        registry.mark_seen(addr(10), 8080).await;
        backdate(&registry, addr(10), 45).await;

        registry.evict_stale(30, 60).await;

        let record = registry.get(addr(10)).await.unwrap();
        assert!(!record.online);
    }

    #[tokio::test]
    async fn test_eviction_removes_stale_unknown_records() {
        let registry = DeviceRegistry::new();
        registry.mark_seen(addr(10), 8080).await;
        backdate(&registry, addr(10), 90).await;

        registry.evict_stale(30, 60).await;

        assert!(registry.get(addr(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_eviction_keeps_confirmed_records_offline() {
        let registry = DeviceRegistry::new();
        registry
            .insert(DeviceRecord::confirmed(addr(10), 8080, "Speaker".into()))
            .await;
        backdate(&registry, addr(10), 300).await;

        registry.evict_stale(30, 60).await;

        let record = registry.get(addr(10)).await.unwrap();
        assert!(!record.online);
        assert_eq!(record.kind, DeviceKind::Confirmed);
    }

    #[tokio::test]
    async fn test_eviction_never_touches_manual_records() {
        let registry = DeviceRegistry::new();
        registry
            .insert(DeviceRecord::manual(addr(10), 8080, "Bench".into()))
            .await;
        backdate(&registry, addr(10), 3600).await;

        registry.evict_stale(30, 60).await;

        let record = registry.get(addr(10)).await.unwrap();
        assert!(record.online);
        assert!(record.manual);
    }
}
