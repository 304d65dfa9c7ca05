use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use stun::attributes::ATTR_XOR_RELAYED_ADDRESS;
use stun::message::{Getter, Message, Setter};
use stun::xoraddr::XorMappedAddress;

/// XOR-RELAYED-ADDRESS attribute (RFC 5766 Section 14.5): the relayed
/// transport address the server allocated for this client.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct RelayedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for RelayedAddress {
    fn default() -> Self {
        RelayedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for RelayedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl RelayedAddress {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

impl Setter for RelayedAddress {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        XorMappedAddress {
            ip: self.ip,
            port: self.port,
        }
        .add_to_as(m, ATTR_XOR_RELAYED_ADDRESS)
    }
}

impl Getter for RelayedAddress {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let mut xor_addr = XorMappedAddress::default();
        xor_addr.get_from_as(m, ATTR_XOR_RELAYED_ADDRESS)?;
        self.ip = xor_addr.ip;
        self.port = xor_addr.port;
        Ok(())
    }
}
