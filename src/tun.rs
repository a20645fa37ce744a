//! Virtual interface management.
//!
//! Creates the TUN device the forwarders bridge to the gateway. The
//! device is addressed with the gateway-assigned client IP and split
//! into halves so each forwarding task owns one direction.

use std::io;
use std::net::Ipv4Addr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio_tun::{Tun, TunBuilder};
use tracing::info;

use crate::error::{Error, Result};

/// An IPv4 packet device, one read per packet, one write per packet.
pub struct VirtualInterface {
    name: String,
    tun: Tun,
}

impl VirtualInterface {
    /// Create the TUN device, addressed and brought up.
    ///
    /// `address` is the assigned client IP in normal byte order. An
    /// empty `name` lets the kernel pick one. Requires CAP_NET_ADMIN.
    pub fn create(name: &str, address: [u8; 4], mtu: u16) -> Result<Self> {
        let address = Ipv4Addr::from(address);

        let mut builder = TunBuilder::new();
        if !name.is_empty() {
            builder = builder.name(name);
        }
        let tun = builder
            .address(address)
            .netmask(Ipv4Addr::new(255, 255, 255, 0))
            .mtu(mtu as i32)
            .up()
            .try_build()
            .map_err(|e| {
                Error::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("creating virtual interface: {}", e),
                ))
            })?;

        let name = tun.name().to_string();
        info!(name = %name, address = %address, mtu, "virtual interface up");

        Ok(Self { name, tun })
    }

    /// Device name, kernel-assigned when none was requested.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Split into the read half the send forwarder drains and the write
    /// half the receive forwarder fills.
    pub fn split(self) -> (ReadHalf<Tun>, WriteHalf<Tun>) {
        tokio::io::split(self.tun)
    }
}
