#[cfg(test)]
mod attributes_test;

use std::fmt;

use crate::error::Result;
use crate::message::{Message, Setter};

/// List of message attributes in wire order.
#[derive(Default, PartialEq, Eq, Debug, Clone)]
pub struct Attributes(pub Vec<RawAttribute>);

impl Attributes {
    /// Returns the first attribute of type `t`, if present.
    pub fn get(&self, t: AttrType) -> Option<&RawAttribute> {
        self.0.iter().find(|a| a.typ == t)
    }

    /// Returns every attribute of type `t` in wire order. Some TURN
    /// attributes (XOR-PEER-ADDRESS) legitimately repeat.
    pub fn get_all(&self, t: AttrType) -> Vec<&RawAttribute> {
        self.0.iter().filter(|a| a.typ == t).collect()
    }

    /// Comprehension-required attribute types this decoder does not
    /// understand; a non-empty result makes a request unusable for
    /// dispatch and feeds the 420 response.
    pub fn unknown_required(&self) -> Vec<AttrType> {
        self.0
            .iter()
            .map(|a| a.typ)
            .filter(|t| t.required() && !t.is_known())
            .collect()
    }
}

/// Attribute type as registered with IANA.
#[derive(PartialEq, Debug, Eq, Default, Copy, Clone, Hash)]
pub struct AttrType(pub u16);

impl AttrType {
    /// True if the type is from the comprehension-required range
    /// (0x0000-0x7FFF).
    pub fn required(&self) -> bool {
        self.0 <= 0x7fff
    }

    /// True if the type is from the comprehension-optional range
    /// (0x8000-0xFFFF).
    pub fn optional(&self) -> bool {
        self.0 >= 0x8000
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    /// True for every attribute type this stack can decode.
    pub fn is_known(&self) -> bool {
        matches!(
            *self,
            ATTR_MAPPED_ADDRESS
                | ATTR_USERNAME
                | ATTR_MESSAGE_INTEGRITY
                | ATTR_ERROR_CODE
                | ATTR_UNKNOWN_ATTRIBUTES
                | ATTR_REALM
                | ATTR_NONCE
                | ATTR_XORMAPPED_ADDRESS
                | ATTR_SOFTWARE
                | ATTR_ALTERNATE_SERVER
                | ATTR_FINGERPRINT
                | ATTR_PRIORITY
                | ATTR_USE_CANDIDATE
                | ATTR_ICE_CONTROLLED
                | ATTR_ICE_CONTROLLING
                | ATTR_CHANNEL_NUMBER
                | ATTR_LIFETIME
                | ATTR_XOR_PEER_ADDRESS
                | ATTR_DATA
                | ATTR_XOR_RELAYED_ADDRESS
                | ATTR_EVEN_PORT
                | ATTR_REQUESTED_TRANSPORT
                | ATTR_DONT_FRAGMENT
                | ATTR_RESERVATION_TOKEN
                | ATTR_MOBILITY_TICKET
        )
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let other = format!("0x{:x}", self.0);

        let s = match *self {
            ATTR_MAPPED_ADDRESS => "MAPPED-ADDRESS",
            ATTR_USERNAME => "USERNAME",
            ATTR_MESSAGE_INTEGRITY => "MESSAGE-INTEGRITY",
            ATTR_ERROR_CODE => "ERROR-CODE",
            ATTR_UNKNOWN_ATTRIBUTES => "UNKNOWN-ATTRIBUTES",
            ATTR_REALM => "REALM",
            ATTR_NONCE => "NONCE",
            ATTR_XORMAPPED_ADDRESS => "XOR-MAPPED-ADDRESS",
            ATTR_SOFTWARE => "SOFTWARE",
            ATTR_ALTERNATE_SERVER => "ALTERNATE-SERVER",
            ATTR_FINGERPRINT => "FINGERPRINT",
            ATTR_PRIORITY => "PRIORITY",
            ATTR_USE_CANDIDATE => "USE-CANDIDATE",
            ATTR_ICE_CONTROLLED => "ICE-CONTROLLED",
            ATTR_ICE_CONTROLLING => "ICE-CONTROLLING",
            ATTR_CHANNEL_NUMBER => "CHANNEL-NUMBER",
            ATTR_LIFETIME => "LIFETIME",
            ATTR_XOR_PEER_ADDRESS => "XOR-PEER-ADDRESS",
            ATTR_DATA => "DATA",
            ATTR_XOR_RELAYED_ADDRESS => "XOR-RELAYED-ADDRESS",
            ATTR_EVEN_PORT => "EVEN-PORT",
            ATTR_REQUESTED_TRANSPORT => "REQUESTED-TRANSPORT",
            ATTR_DONT_FRAGMENT => "DONT-FRAGMENT",
            ATTR_RESERVATION_TOKEN => "RESERVATION-TOKEN",
            ATTR_MOBILITY_TICKET => "MOBILITY-TICKET",
            _ => other.as_str(),
        };

        write!(f, "{s}")
    }
}

/// Attributes from the comprehension-required range (RFC 5389).
pub const ATTR_MAPPED_ADDRESS: AttrType = AttrType(0x0001);
pub const ATTR_USERNAME: AttrType = AttrType(0x0006);
pub const ATTR_MESSAGE_INTEGRITY: AttrType = AttrType(0x0008);
pub const ATTR_ERROR_CODE: AttrType = AttrType(0x0009);
pub const ATTR_UNKNOWN_ATTRIBUTES: AttrType = AttrType(0x000A);
pub const ATTR_REALM: AttrType = AttrType(0x0014);
pub const ATTR_NONCE: AttrType = AttrType(0x0015);
pub const ATTR_XORMAPPED_ADDRESS: AttrType = AttrType(0x0020);

/// Attributes from the comprehension-optional range (RFC 5389).
pub const ATTR_SOFTWARE: AttrType = AttrType(0x8022);
pub const ATTR_ALTERNATE_SERVER: AttrType = AttrType(0x8023);
pub const ATTR_FINGERPRINT: AttrType = AttrType(0x8028);

/// Attributes from RFC 5245 ICE.
pub const ATTR_PRIORITY: AttrType = AttrType(0x0024);
pub const ATTR_USE_CANDIDATE: AttrType = AttrType(0x0025);
pub const ATTR_ICE_CONTROLLED: AttrType = AttrType(0x8029);
pub const ATTR_ICE_CONTROLLING: AttrType = AttrType(0x802A);

/// Attributes from RFC 5766 TURN.
pub const ATTR_CHANNEL_NUMBER: AttrType = AttrType(0x000C);
pub const ATTR_LIFETIME: AttrType = AttrType(0x000D);
pub const ATTR_XOR_PEER_ADDRESS: AttrType = AttrType(0x0012);
pub const ATTR_DATA: AttrType = AttrType(0x0013);
pub const ATTR_XOR_RELAYED_ADDRESS: AttrType = AttrType(0x0016);
pub const ATTR_EVEN_PORT: AttrType = AttrType(0x0018);
pub const ATTR_REQUESTED_TRANSPORT: AttrType = AttrType(0x0019);
pub const ATTR_DONT_FRAGMENT: AttrType = AttrType(0x001A);
pub const ATTR_RESERVATION_TOKEN: AttrType = AttrType(0x0022);

/// Attribute from RFC 8016 TURN mobility.
pub const ATTR_MOBILITY_TICKET: AttrType = AttrType(0x8030);

/// A Type-Length-Value attribute as carried on the wire. Values are
/// kept verbatim; typed accessors live in the per-attribute modules.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub typ: AttrType,
    pub length: u16, // ignored while encoding
    pub value: Vec<u8>,
}

impl fmt::Display for RawAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.typ, self.value)
    }
}

impl Setter for RawAttribute {
    /// Adds the attribute as-is, ignoring the stored length field.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(self.typ, &self.value);
        Ok(())
    }
}

pub(crate) const PADDING: usize = 4;

/// STUN aligns attribute values on 32-bit boundaries; the padding
/// bytes do not count toward the attribute length.
pub(crate) fn nearest_padded_value_length(l: usize) -> usize {
    let mut n = PADDING * (l / PADDING);
    if n < l {
        n += PADDING;
    }
    n
}
