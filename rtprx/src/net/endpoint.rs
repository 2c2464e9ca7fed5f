//! Bind addresses for stream sockets.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Address family negotiated by the owning session.
///
/// Only consulted when the stream does not name a local host, to pick the
/// wildcard address the data socket binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressFamily {
    #[default]
    Inet,
    Inet6,
}

impl AddressFamily {
    /// The wildcard address of this family (`0.0.0.0` or `::`).
    #[must_use]
    pub const fn unspecified(self) -> IpAddr {
        match self {
            Self::Inet => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            Self::Inet6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl From<IpAddr> for AddressFamily {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Inet,
            IpAddr::V6(_) => Self::Inet6,
        }
    }
}

/// A local or remote UDP endpoint (IP address + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    #[must_use]
    pub const fn new(addr: IpAddr, port: u16) -> Self {
        Self(SocketAddr::new(addr, port))
    }

    /// Wildcard endpoint for `family` on `port`.
    #[must_use]
    pub const fn any(family: AddressFamily, port: u16) -> Self {
        Self::new(family.unspecified(), port)
    }

    /// IPv4 loopback endpoint on `port`.
    #[must_use]
    pub const fn localhost(port: u16) -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    /// Chooses where a stream's data socket binds.
    ///
    /// An explicit local host wins; otherwise the wildcard address of the
    /// session's family is used.
    #[must_use]
    pub fn for_stream(local_host: Option<IpAddr>, family: AddressFamily, port: u16) -> Self {
        match local_host {
            Some(host) => Self::new(host, port),
            None => Self::any(family, port),
        }
    }

    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.0.port()
    }

    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        match self.0 {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        }
    }

    #[must_use]
    pub const fn as_socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(ep: Endpoint) -> Self {
        ep.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_host_wins_over_family() {
        let host: IpAddr = "192.168.1.20".parse().unwrap();
        let ep = Endpoint::for_stream(Some(host), AddressFamily::Inet6, 5004);
        assert_eq!(ep.ip(), host);
        assert_eq!(ep.port(), 5004);
        assert_eq!(ep.family(), AddressFamily::Inet);
    }

    #[test]
    fn wildcard_follows_family() {
        let v4 = Endpoint::for_stream(None, AddressFamily::Inet, 6000);
        assert_eq!(v4.ip(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let v6 = Endpoint::for_stream(None, AddressFamily::Inet6, 6000);
        assert_eq!(v6.ip(), IpAddr::V6(Ipv6Addr::UNSPECIFIED));
        assert_eq!(v6.port(), 6000);
    }

    #[test]
    fn family_from_ip() {
        assert_eq!(
            AddressFamily::from(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            AddressFamily::Inet6
        );
        assert_eq!(AddressFamily::default(), AddressFamily::Inet);
    }

    #[test]
    fn display_matches_socket_addr() {
        let ep = Endpoint::localhost(8080);
        assert_eq!(format!("{ep}"), "127.0.0.1:8080");
        assert_eq!(format!("{}", Endpoint::any(AddressFamily::Inet6, 9)), "[::]:9");
    }
}
