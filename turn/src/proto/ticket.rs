use stun::attributes::ATTR_MOBILITY_TICKET;
use stun::message::{Getter, Message, Setter};

/// MOBILITY-TICKET attribute (RFC 8016): opaque server-issued bytes.
/// An empty ticket in an Allocate request asks the server to issue
/// one; later requests echo the stored ticket so the allocation
/// survives a client address change.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MobilityTicket(pub Vec<u8>);

impl Setter for MobilityTicket {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        m.add(ATTR_MOBILITY_TICKET, &self.0);
        Ok(())
    }
}

impl Getter for MobilityTicket {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        self.0 = m.get(ATTR_MOBILITY_TICKET)?;
        Ok(())
    }
}
