//! Local address resolution and subnet enumeration

use network_interface::{NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use tracing::debug;

/// First non-loopback IPv4 address of this host
pub fn local_ipv4() -> Option<Ipv4Addr> {
    let interfaces = NetworkInterface::show().ok()?;
    for iface in interfaces {
        for addr in &iface.addr {
            if let network_interface::Addr::V4(v4) = addr {
                if !v4.ip.is_loopback() {
                    debug!(interface = %iface.name, ip = %v4.ip, "Using local address");
                    return Some(v4.ip);
                }
            }
        }
    }
    None
}

/// /24 network base of an address (x.y.z.0)
pub fn network_prefix(ip: Ipv4Addr) -> Ipv4Addr {
    let octets = ip.octets();
    Ipv4Addr::new(octets[0], octets[1], octets[2], 0)
}

/// All host addresses of a /24 network, suffixes 1..=254
pub fn host_addrs(network: Ipv4Addr) -> Vec<Ipv4Addr> {
    let octets = network.octets();
    (1..=254)
        .map(|suffix| Ipv4Addr::new(octets[0], octets[1], octets[2], suffix))
        .collect()
}
