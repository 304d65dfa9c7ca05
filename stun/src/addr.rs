#[cfg(test)]
mod addr_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::attributes::*;
use crate::error::*;
use crate::message::*;

pub(crate) const FAMILY_IPV4: u16 = 0x01;
pub(crate) const FAMILY_IPV6: u16 = 0x02;
pub(crate) const IPV4LEN: usize = 4;
pub(crate) const IPV6LEN: usize = 16;

pub(crate) fn write_addr_value(ip: IpAddr, port: u16) -> Vec<u8> {
    let mut value = Vec::with_capacity(4 + IPV6LEN);
    let family = match ip {
        IpAddr::V4(_) => FAMILY_IPV4,
        IpAddr::V6(_) => FAMILY_IPV6,
    };
    value.extend_from_slice(&family.to_be_bytes());
    value.extend_from_slice(&port.to_be_bytes());
    match ip {
        IpAddr::V4(v4) => value.extend_from_slice(&v4.octets()),
        IpAddr::V6(v6) => value.extend_from_slice(&v6.octets()),
    }
    value
}

pub(crate) fn read_addr_value(t: AttrType, v: &[u8]) -> Result<(IpAddr, u16)> {
    if v.len() <= 4 {
        return Err(Error::ErrUnexpectedEof);
    }
    let family = u16::from_be_bytes([v[0], v[1]]);
    let port = u16::from_be_bytes([v[2], v[3]]);
    let ip = match family {
        FAMILY_IPV4 => {
            crate::checks::check_size(t, v[4..].len(), IPV4LEN)?;
            let mut octets = [0u8; IPV4LEN];
            octets.copy_from_slice(&v[4..4 + IPV4LEN]);
            IpAddr::V4(Ipv4Addr::from(octets))
        }
        FAMILY_IPV6 => {
            crate::checks::check_size(t, v[4..].len(), IPV6LEN)?;
            let mut octets = [0u8; IPV6LEN];
            octets.copy_from_slice(&v[4..4 + IPV6LEN]);
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        other => return Err(Error::Other(format!("bad address family {other}"))),
    };
    Ok((ip, port))
}

/// MAPPED-ADDRESS attribute (RFC 5389 Section 15.1); also the shape of
/// every non-XORed address attribute.
pub struct MappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for MappedAddress {
    fn default() -> Self {
        MappedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for MappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

impl Setter for MappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl Getter for MappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_MAPPED_ADDRESS)
    }
}

impl MappedAddress {
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        m.add(t, &write_addr_value(self.ip, self.port));
        Ok(())
    }

    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        let (ip, port) = read_addr_value(t, &v)?;
        self.ip = ip;
        self.port = port;
        Ok(())
    }
}

/// ALTERNATE-SERVER attribute (RFC 5389 Section 15.11).
pub type AlternateServer = MappedAddress;
