//! Bounded-concurrency reachability probing

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::debug;

/// Check whether a host accepts connections on the service port
///
/// Connect-then-close only. No command is ever sent here: probing every
/// responsive host with an identification command made the peripheral reset.
pub async fn probe_host(addr: Ipv4Addr, port: u16, probe_timeout: Duration) -> bool {
    let target = SocketAddr::from((addr, port));
    matches!(timeout(probe_timeout, TcpStream::connect(target)).await, Ok(Ok(_)))
}

/// Probe many hosts concurrently, at most `concurrency` in flight
pub async fn sweep(
    hosts: &[Ipv4Addr],
    port: u16,
    probe_timeout: Duration,
    concurrency: usize,
) -> Vec<Ipv4Addr> {
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks = JoinSet::new();

    for &host in hosts {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            if probe_host(host, port, probe_timeout).await {
                Some(host)
            } else {
                None
            }
        });
    }

    let mut responsive = Vec::new();
    while let Some(result) = tasks.join_next().await {
        if let Ok(Some(addr)) = result {
            debug!(ip = %addr, "Host responded on service port");
            responsive.push(addr);
        }
    }
    responsive
}
