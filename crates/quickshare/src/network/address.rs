//! Local IPv4 address discovery.
//!
//! The resolver reads the host interface table once and picks the first
//! IPv4 address that is not a loopback address. Enumeration order is
//! whatever the host network stack returns, so machines with several active
//! interfaces may advertise any one of them.

use std::net::{IpAddr, Ipv4Addr};

use thiserror::Error;

/// Errors that can occur while resolving the advertised address.
#[derive(Debug, Error)]
pub enum AddressError {
    /// No interface could be enumerated or none carries a usable address.
    #[error("cannot find local IP address, are you connected to a network?")]
    NoAddressFound,
}

/// Select the first non-loopback IPv4 address from `addrs`.
pub fn select_address<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
        _ => None,
    })
}

/// Resolve the local address to advertise to peers.
///
/// Fails with [`AddressError::NoAddressFound`] when the interface table
/// cannot be read or contains no qualifying address.
pub fn resolve_local_address() -> Result<Ipv4Addr, AddressError> {
    let interfaces = if_addrs::get_if_addrs().map_err(|e| {
        tracing::warn!("Failed to enumerate network interfaces: {}", e);
        AddressError::NoAddressFound
    })?;

    let selected = select_address(
        interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| iface.ip()),
    )
    .ok_or(AddressError::NoAddressFound)?;

    tracing::debug!("Selected local address {}", selected);
    Ok(selected)
}

/// Build the URL peers use to reach the server.
pub fn display_url(ip: Ipv4Addr, port: u16) -> String {
    format!("http://{}:{}", ip, port)
}
