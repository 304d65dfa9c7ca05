use stun::attributes::ATTR_EVEN_PORT;
use stun::message::{Getter, Message, Setter};

const EVEN_PORT_SIZE: usize = 1;
const RESERVE_BIT: u8 = 0x80;

/// EVEN-PORT attribute (RFC 5766 Section 14.6): requests an
/// even-numbered relayed port, optionally reserving the next one.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub struct EvenPort {
    pub reserve_next: bool,
}

impl Setter for EvenPort {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        let v = [if self.reserve_next { RESERVE_BIT } else { 0 }];
        m.add(ATTR_EVEN_PORT, &v);
        Ok(())
    }
}

impl Getter for EvenPort {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let v = m.get(ATTR_EVEN_PORT)?;
        if v.len() != EVEN_PORT_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        self.reserve_next = v[0] & RESERVE_BIT != 0;
        Ok(())
    }
}
