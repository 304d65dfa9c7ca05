#[cfg(test)]
mod control_test;

use std::fmt;

use stun::attributes::{ATTR_ICE_CONTROLLED, ATTR_ICE_CONTROLLING, AttrType};
use stun::message::{Getter, Message, Setter};

pub(crate) const TIE_BREAKER_SIZE: usize = 8; // 64 bit

/// The 64-bit tie-breaker shared by ICE-CONTROLLING and
/// ICE-CONTROLLED (RFC 5245 Section 7.1.2.2).
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct TieBreaker(pub u64);

impl TieBreaker {
    pub fn add_to_as(self, m: &mut Message, t: AttrType) -> stun::Result<()> {
        m.add(t, &self.0.to_be_bytes());
        Ok(())
    }

    pub fn get_from_as(&mut self, m: &Message, t: AttrType) -> stun::Result<()> {
        let v = m.get(t)?;
        if v.len() != TIE_BREAKER_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        self.0 = u64::from_be_bytes([v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7]]);
        Ok(())
    }
}

/// ICE agent role.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Default)]
pub enum Role {
    #[default]
    Controlling,
    Controlled,
}

impl Role {
    pub fn flipped(self) -> Role {
        match self {
            Role::Controlling => Role::Controlled,
            Role::Controlled => Role::Controlling,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Controlling => "controlling",
            Role::Controlled => "controlled",
        };
        write!(f, "{s}")
    }
}

/// Role attribute for outgoing checks: serializes as ICE-CONTROLLING
/// or ICE-CONTROLLED depending on the sender's role.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct AttrControl {
    pub role: Role,
    pub tie_breaker: TieBreaker,
}

impl Setter for AttrControl {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        match self.role {
            Role::Controlling => self.tie_breaker.add_to_as(m, ATTR_ICE_CONTROLLING),
            Role::Controlled => self.tie_breaker.add_to_as(m, ATTR_ICE_CONTROLLED),
        }
    }
}

impl Getter for AttrControl {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        if m.contains(ATTR_ICE_CONTROLLING) {
            self.role = Role::Controlling;
            return self.tie_breaker.get_from_as(m, ATTR_ICE_CONTROLLING);
        }
        if m.contains(ATTR_ICE_CONTROLLED) {
            self.role = Role::Controlled;
            return self.tie_breaker.get_from_as(m, ATTR_ICE_CONTROLLED);
        }
        Err(stun::Error::ErrAttributeNotFound)
    }
}
