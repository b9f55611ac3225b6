//! Aria Core - Core types and device registry
//!
//! This crate provides the foundational types for the Aria system:
//! - Device records for tracking discovered peripherals
//! - A shared registry with liveness-based eviction

pub mod device;
pub mod registry;

pub use device::{DeviceKind, DeviceRecord};
pub use registry::DeviceRegistry;
