
pub mod chandata;
pub mod channum;
pub mod data;
pub mod dontfrag;
pub mod evenport;
pub mod lifetime;
pub mod peeraddr;
pub mod relayaddr;
pub mod reqtrans;
pub mod reservtoken;
pub mod ticket;

use std::fmt;

/// Transport protocol carried in REQUESTED-TRANSPORT (RFC 5766
/// Section 14.7); values are IANA protocol numbers.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug, Hash)]
pub struct Protocol(pub u8);

/// IANA protocol number for UDP.
pub const PROTO_UDP: Protocol = Protocol(17);
/// IANA protocol number for TCP.
pub const PROTO_TCP: Protocol = Protocol(6);

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = format!("{}", self.0);
        let s = match *self {
            PROTO_UDP => "UDP",
            PROTO_TCP => "TCP",
            _ => unknown.as_str(),
        };
        write!(f, "{s}")
    }
}
