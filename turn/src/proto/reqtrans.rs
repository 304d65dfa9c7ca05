use std::fmt;

use stun::attributes::ATTR_REQUESTED_TRANSPORT;
use stun::message::{Getter, Message, Setter};

use crate::proto::Protocol;

const REQUESTED_TRANSPORT_SIZE: usize = 4;

/// REQUESTED-TRANSPORT attribute (RFC 5766 Section 14.7): the
/// protocol number followed by three reserved bytes.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub struct RequestedTransport {
    pub protocol: Protocol,
}

impl fmt::Display for RequestedTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "protocol: {}", self.protocol)
    }
}

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        let mut v = [0u8; REQUESTED_TRANSPORT_SIZE];
        v[0] = self.protocol.0;
        // the final three bytes are RFFU
        m.add(ATTR_REQUESTED_TRANSPORT, &v);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        if v.len() != REQUESTED_TRANSPORT_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        self.protocol = Protocol(v[0]);
        Ok(())
    }
}
