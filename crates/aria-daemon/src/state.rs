//! Application state management

use aria_core::DeviceRegistry;
use aria_discovery::DiscoveryEngine;
use aria_link::{AlertBroadcast, SessionManager};
use std::sync::Arc;

use crate::config::Config;

/// Shared application state
///
/// Every component is owned here and handed out by handle; nothing is
/// process-global. Registry, session, and subscriber state are volatile and
/// rebuilt from network reality on each run.
pub struct AppState {
    /// Discovery engine (owns the device registry)
    pub engine: Arc<DiscoveryEngine>,
    /// The single peripheral session
    pub session: Arc<SessionManager>,
    /// Telemetry fan-out
    pub alerts: Arc<AlertBroadcast>,
    /// Configuration
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let registry = Arc::new(DeviceRegistry::new());
        let alerts = Arc::new(AlertBroadcast::new());
        let engine = Arc::new(DiscoveryEngine::new(config.discovery.clone(), registry));
        let session = Arc::new(SessionManager::new(Arc::clone(&alerts)));

        Arc::new(Self {
            engine,
            session,
            alerts,
            config,
        })
    }
}
