use std::fmt;
use std::time::Duration;

use stun::attributes::ATTR_LIFETIME;
use stun::message::{Getter, Message, Setter};

const LIFETIME_SIZE: usize = 4;

/// LIFETIME attribute (RFC 5766 Section 14.2): allocation lifetime in
/// seconds, u32 network order.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub struct Lifetime(pub Duration);

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

impl Setter for Lifetime {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        let seconds = self.0.as_secs().min(u32::MAX as u64) as u32;
        m.add(ATTR_LIFETIME, &seconds.to_be_bytes());
        Ok(())
    }
}

impl Getter for Lifetime {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let v = m.get(ATTR_LIFETIME)?;
        if v.len() != LIFETIME_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        self.0 = Duration::from_secs(u32::from_be_bytes([v[0], v[1], v[2], v[3]]) as u64);
        Ok(())
    }
}
