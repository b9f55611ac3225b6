//! Link error types

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    /// An operation required an active session and none exists
    #[error("not connected to a peripheral")]
    NotConnected,
    /// The transport could not be opened within the connect timeout
    #[error("failed to connect to {0}: {1}")]
    Connect(SocketAddr, #[source] std::io::Error),
    /// A write on an established session failed; the session is likely dead
    #[error("link I/O error: {0}")]
    Io(#[from] std::io::Error),
}
