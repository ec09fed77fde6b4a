use std::fmt::Display;
use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::time::Duration;

/// The default timeout applied to every inter-peer request/response exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A network address as exchanged over the wire and kept by the address manager
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NetAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl NetAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// The wire form: a 16-byte IPv6 (v4-mapped when needed) address
    pub fn ip_octets(&self) -> [u8; 16] {
        match self.ip {
            IpAddr::V4(ip) => ip.to_ipv6_mapped().octets(),
            IpAddr::V6(ip) => ip.octets(),
        }
    }

    pub fn from_octets(octets: [u8; 16], port: u16) -> Self {
        let v6 = Ipv6Addr::from(octets);
        let ip = match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        };
        Self { ip, port }
    }
}

impl From<SocketAddr> for NetAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl From<NetAddress> for SocketAddr {
    fn from(addr: NetAddress) -> Self {
        SocketAddr::new(addr.ip, addr.port)
    }
}

impl Display for NetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octets_roundtrip() {
        let v4: NetAddress = "1.2.3.4:16611".parse::<SocketAddr>().unwrap().into();
        assert_eq!(NetAddress::from_octets(v4.ip_octets(), v4.port), v4);

        let v6: NetAddress = "[2001:db8::1]:16611".parse::<SocketAddr>().unwrap().into();
        assert_eq!(NetAddress::from_octets(v6.ip_octets(), v6.port), v6);
    }
}
