use stun::attributes::ATTR_RESERVATION_TOKEN;
use stun::message::{Getter, Message, Setter};

const RESERVATION_TOKEN_SIZE: usize = 8;

/// RESERVATION-TOKEN attribute (RFC 5766 Section 14.9): opaque token
/// naming a relayed address reserved by an earlier EVEN-PORT request.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ReservationToken(pub Vec<u8>);

impl Setter for ReservationToken {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        if self.0.len() != RESERVATION_TOKEN_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        m.add(ATTR_RESERVATION_TOKEN, &self.0);
        Ok(())
    }
}

impl Getter for ReservationToken {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let v = m.get(ATTR_RESERVATION_TOKEN)?;
        if v.len() != RESERVATION_TOKEN_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        self.0 = v;
        Ok(())
    }
}
