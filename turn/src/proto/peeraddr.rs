use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use stun::attributes::ATTR_XOR_PEER_ADDRESS;
use stun::message::{Getter, Message, Setter};
use stun::xoraddr::XorMappedAddress;

/// XOR-PEER-ADDRESS attribute (RFC 5766 Section 14.3). May repeat in
/// CreatePermission requests, one instance per peer.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct PeerAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for PeerAddress {
    fn default() -> Self {
        PeerAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        PeerAddress {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl PeerAddress {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Decodes every XOR-PEER-ADDRESS instance in wire order.
pub fn peer_addresses(m: &Message) -> stun::Result<Vec<PeerAddress>> {
    let mut out = Vec::new();
    for attr in m.attributes.get_all(ATTR_XOR_PEER_ADDRESS) {
        let (ip, port) =
            XorMappedAddress::decode_value(ATTR_XOR_PEER_ADDRESS, &attr.value, &m.transaction_id)?;
        out.push(PeerAddress { ip, port });
    }
    Ok(out)
}

impl Setter for PeerAddress {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        XorMappedAddress {
            ip: self.ip,
            port: self.port,
        }
        .add_to_as(m, ATTR_XOR_PEER_ADDRESS)
    }
}

impl Getter for PeerAddress {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let mut xor_addr = XorMappedAddress::default();
        xor_addr.get_from_as(m, ATTR_XOR_PEER_ADDRESS)?;
        self.ip = xor_addr.ip;
        self.port = xor_addr.port;
        Ok(())
    }
}
