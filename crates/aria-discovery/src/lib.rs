//! Aria Discovery - LAN discovery for the audio peripheral
//!
//! Discovery is a brute-force sweep of the local /24 subnet: every host
//! suffix is probed with a short-timeout TCP connect to the service port.
//! A successful connect establishes liveness only; identification is not
//! attempted during the sweep (see `DiscoveryEngine::identify_device`).

pub mod engine;
pub mod net;
pub mod probe;

pub use engine::{DiscoveryConfig, DiscoveryEngine, DiscoveryError};
