#[cfg(test)]
mod xoraddr_test;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::addr::*;
use crate::attributes::*;
use crate::error::*;
use crate::message::*;

/// XOR-MAPPED-ADDRESS attribute (RFC 5389 Section 15.2) and the shape
/// shared by the XORed TURN address attributes. The port is XORed with
/// the top half of the magic cookie; the address with the cookie
/// followed by the transaction id (IPv6 only).
pub struct XorMappedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for XorMappedAddress {
    fn default() -> Self {
        XorMappedAddress {
            ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
        }
    }
}

impl fmt::Display for XorMappedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            IpAddr::V4(_) => write!(f, "{}:{}", self.ip, self.port),
            IpAddr::V6(_) => write!(f, "[{}]:{}", self.ip, self.port),
        }
    }
}

fn xor_mask(transaction_id: &TransactionId) -> [u8; IPV6LEN] {
    let mut mask = [0u8; IPV6LEN];
    mask[0..4].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    mask[4..].copy_from_slice(&transaction_id.0);
    mask
}

impl Setter for XorMappedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        self.add_to_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl Getter for XorMappedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.get_from_as(m, ATTR_XORMAPPED_ADDRESS)
    }
}

impl XorMappedAddress {
    /// Decodes one XORed address attribute value against the given
    /// transaction id; used for attributes that may repeat within a
    /// message.
    pub fn decode_value(
        t: AttrType,
        value: &[u8],
        transaction_id: &TransactionId,
    ) -> Result<(IpAddr, u16)> {
        let (ip, xport) = read_addr_value(t, value)?;
        let mask = xor_mask(transaction_id);
        let port = xport ^ (MAGIC_COOKIE >> 16) as u16;
        let ip = match ip {
            IpAddr::V4(v4) => {
                let mut octets = v4.octets();
                for (b, k) in octets.iter_mut().zip(mask.iter()) {
                    *b ^= k;
                }
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            IpAddr::V6(v6) => {
                let mut octets = v6.octets();
                for (b, k) in octets.iter_mut().zip(mask.iter()) {
                    *b ^= k;
                }
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        };
        Ok((ip, port))
    }

    /// Adds the XORed address value to m as attribute type t.
    pub fn add_to_as(&self, m: &mut Message, t: AttrType) -> Result<()> {
        let mask = xor_mask(&m.transaction_id);
        let xport = self.port ^ (MAGIC_COOKIE >> 16) as u16;

        let ip = match self.ip {
            IpAddr::V4(v4) => {
                let mut octets = v4.octets();
                for (b, k) in octets.iter_mut().zip(mask.iter()) {
                    *b ^= k;
                }
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            IpAddr::V6(v6) => {
                let mut octets = v6.octets();
                for (b, k) in octets.iter_mut().zip(mask.iter()) {
                    *b ^= k;
                }
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        };

        m.add(t, &write_addr_value(ip, xport));
        Ok(())
    }

    /// Decodes the XORed address attribute of type t from m.
    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> Result<()> {
        let v = m.get(t)?;
        let (ip, port) = Self::decode_value(t, &v, &m.transaction_id)?;
        self.ip = ip;
        self.port = port;
        Ok(())
    }
}
