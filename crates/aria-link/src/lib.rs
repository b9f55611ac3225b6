//! Aria Link - Peripheral transport and telemetry
//!
//! This crate owns everything that touches the peripheral's TCP link:
//! - The framed byte protocol (commands out, telemetry and discovery replies in)
//! - The single active session and its background telemetry reader
//! - The lossy multi-subscriber alert broadcast

pub mod error;
pub mod protocol;
pub mod session;
pub mod telemetry;

pub use error::LinkError;
pub use session::SessionManager;
pub use telemetry::{AlertBroadcast, AlertKind, Subscription, TemperatureAlert};
