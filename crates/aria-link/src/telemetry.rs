//! Temperature alerts and the subscriber broadcast
//!
//! Delivery is non-blocking per subscriber: a full queue drops that alert for
//! that subscriber only. A slow consumer must never stall the telemetry
//! reader or other subscribers, so the policy is freshness over completeness.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Per-subscriber queue capacity
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 10;

/// Classification of a temperature event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Dropped back below the first threshold (reserved; newer firmware only)
    BelowThreshold,
    /// First threshold reached, fan engaged
    Threshold1,
    /// Second threshold reached, buzzer alarm
    Threshold2,
    /// Returned to normal
    Normal,
    /// Periodic temperature report
    #[serde(rename = "update")]
    PeriodicUpdate,
}

/// A decoded temperature event from the peripheral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// Threshold in °C that triggered the alert, if any
    pub threshold: Option<u32>,
    /// Measured temperature in °C, 0.1° resolution
    pub temperature: f64,
    pub message: String,
    /// Unix seconds
    pub timestamp: i64,
}

/// Fan-out of alerts to any number of subscribers
#[derive(Default)]
pub struct AlertBroadcast {
    subscribers: RwLock<HashMap<u64, mpsc::Sender<TemperatureAlert>>>,
    next_id: AtomicU64,
}

impl AlertBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with a bounded delivery queue
    ///
    /// The subscription unregisters itself when dropped, so every consumer
    /// exit path, including cancellation, releases its queue.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.subscribers.write().insert(id, tx);
        debug!(subscriber = id, "Telemetry subscriber registered");
        Subscription {
            id,
            rx,
            broadcast: Arc::clone(self),
        }
    }

    fn unsubscribe(&self, id: u64) {
        if self.subscribers.write().remove(&id).is_some() {
            debug!(subscriber = id, "Telemetry subscriber removed");
        }
    }

    /// Deliver an alert to every registered subscriber without blocking
    pub fn publish(&self, alert: TemperatureAlert) {
        let subscribers = self.subscribers.read();
        for (id, tx) in subscribers.iter() {
            if tx.try_send(alert.clone()).is_err() {
                trace!(subscriber = id, "Subscriber queue full, alert dropped");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Handle to one registered subscriber queue
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<TemperatureAlert>,
    broadcast: Arc<AlertBroadcast>,
}

impl Subscription {
    /// Receive the next alert; None once unsubscribed and drained
    pub async fn recv(&mut self) -> Option<TemperatureAlert> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.broadcast.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol;

    fn alert(temperature: f64) -> TemperatureAlert {
        protocol::decode_telemetry(&[
            protocol::TEMP_UPDATE,
            ((temperature * 10.0) as u16 >> 8) as u8,
            ((temperature * 10.0) as u16 & 0xFF) as u8,
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let broadcast = Arc::new(AlertBroadcast::new());
        let mut a = broadcast.subscribe();
        let mut b = broadcast.subscribe();

        broadcast.publish(alert(21.5));

        assert_eq!(a.recv().await.unwrap().temperature, 21.5);
        assert_eq!(b.recv().await.unwrap().temperature, 21.5);
    }

    #[tokio::test]
    async fn test_full_queue_drops_for_that_subscriber_only() {
        let broadcast = Arc::new(AlertBroadcast::new());
        let mut slow = broadcast.subscribe();
        let mut fast = broadcast.subscribe();

        // Fill both queues, then drain only the fast consumer
        for i in 0..SUBSCRIBER_QUEUE_CAPACITY {
            broadcast.publish(alert(20.0 + i as f64));
        }
        for _ in 0..SUBSCRIBER_QUEUE_CAPACITY {
            fast.recv().await.unwrap();
        }

        // The slow queue is full: this alert is dropped for it, not for fast
        broadcast.publish(alert(99.5));

        assert_eq!(fast.recv().await.unwrap().temperature, 99.5);
        for _ in 0..SUBSCRIBER_QUEUE_CAPACITY {
            assert_ne!(slow.recv().await.unwrap().temperature, 99.5);
        }
        assert!(slow.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_drop_unregisters_subscriber() {
        let broadcast = Arc::new(AlertBroadcast::new());
        let sub = broadcast.subscribe();
        assert_eq!(broadcast.subscriber_count(), 1);

        drop(sub);
        assert_eq!(broadcast.subscriber_count(), 0);

        // Publishing with no subscribers is a no-op
        broadcast.publish(alert(25.0));
    }

    #[test]
    fn test_alert_json_shape() {
        let value = serde_json::to_value(alert(25.0)).unwrap();
        assert_eq!(value["type"], "update");
        assert_eq!(value["temperature"], 25.0);
        assert_eq!(value["threshold"], serde_json::Value::Null);
        assert!(value["timestamp"].is_i64());
        assert!(value["message"].is_string());
    }

    #[test]
    fn test_alert_kind_strings() {
        assert_eq!(
            serde_json::to_value(AlertKind::Threshold1).unwrap(),
            "threshold1"
        );
        assert_eq!(
            serde_json::to_value(AlertKind::BelowThreshold).unwrap(),
            "below_threshold"
        );
        assert_eq!(serde_json::to_value(AlertKind::Normal).unwrap(), "normal");
    }
}
