use anyhow::{bail, Result};
use local_ip_address::list_afinet_netifas;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use str0m::{net::Protocol, Candidate};
use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn init_log() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Pick an IPv4 address that can be shared with a remote ICE peer.
///
/// Loopback and link-local interfaces are skipped; the first remaining one
/// wins.
pub fn select_host_address() -> Result<IpAddr> {
    for (name, ip) in list_afinet_netifas()? {
        info!("iface: {} / {:?}", name, ip);
        if let IpAddr::V4(ip4) = ip {
            if !ip4.is_loopback() && !ip4.is_link_local() {
                return Ok(ip);
            }
        }
    }

    bail!("Found no usable network interface")
}

/// Bind a UDP socket on `ip` and describe it as a host candidate.
///
/// The socket is bound to the concrete address so that the destination of
/// every received datagram matches the candidate.
pub fn bind_host_socket(ip: IpAddr) -> Result<(UdpSocket, Candidate)> {
    let socket = UdpSocket::bind(SocketAddr::new(ip, 0))?;
    let addr = socket.local_addr()?;
    info!("Bound UDP port: {}", addr);
    let candidate = Candidate::host(addr, Protocol::Udp)?;
    Ok((socket, candidate))
}
