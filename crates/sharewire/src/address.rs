use super::*;

use crate::error::IoSnafu;

/// A peer endpoint as carried inside `version` and `addrs` payloads. IPv4
/// addresses travel in their IPv6-mapped form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAddress {
    pub services: u64,
    pub address: Ipv6Addr,
    pub port: u16,
}

impl PoolAddress {
    pub fn new(services: u64, address: IpAddr, port: u16) -> Self {
        let address = match address {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };

        Self {
            services,
            address,
            port,
        }
    }

    pub fn read(r: &mut impl Read) -> Result<Self> {
        let services = r.read_u64::<LittleEndian>().context(IoSnafu)?;
        let address = codec::read_ip(r)?;
        let port = r.read_u16::<LittleEndian>().context(IoSnafu)?;

        Ok(Self {
            services,
            address,
            port,
        })
    }

    pub fn write(&self, w: &mut impl Write) -> Result {
        w.write_u64::<LittleEndian>(self.services).context(IoSnafu)?;
        codec::write_ip(w, self.address)?;
        w.write_u16::<LittleEndian>(self.port).context(IoSnafu)
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address.to_canonical(), self.port)
    }
}

/// A timestamped peer address from `addrs` gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addr {
    pub timestamp: u64,
    pub address: PoolAddress,
}

impl Addr {
    pub fn read(r: &mut impl Read) -> Result<Self> {
        let timestamp = r.read_u64::<LittleEndian>().context(IoSnafu)?;
        let address = PoolAddress::read(r)?;

        Ok(Self { timestamp, address })
    }

    pub fn write(&self, w: &mut impl Write) -> Result {
        w.write_u64::<LittleEndian>(self.timestamp).context(IoSnafu)?;
        self.address.write(w)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq, std::net::Ipv4Addr};

    #[test]
    fn round_trips() {
        let addr = Addr {
            timestamp: 1_700_000_000,
            address: PoolAddress::new(0, IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)), 9346),
        };

        let mut bytes = Vec::new();
        addr.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 8 + 8 + 16 + 2);
        assert_eq!(Addr::read(&mut &bytes[..]).unwrap(), addr);
    }

    #[test]
    fn ipv4_maps_and_canonicalizes() {
        let address = PoolAddress::new(0, IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9346);
        assert_eq!(
            address.socket_addr(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9346)
        );
    }
}
