use stun::attributes::ATTR_DATA;
use stun::message::{Getter, Message, Setter};

/// DATA attribute (RFC 5766 Section 14.4): the opaque payload of a
/// Send or Data indication.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Setter for Data {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        m.add(ATTR_DATA, &self.0);
        Ok(())
    }
}

impl Getter for Data {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        self.0 = m.get(ATTR_DATA)?;
        Ok(())
    }
}
