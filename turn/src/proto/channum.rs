use std::fmt;

use stun::attributes::ATTR_CHANNEL_NUMBER;
use stun::message::{Getter, Message, Setter};

/// Lowest channel number a client may bind (RFC 5766 Section 11).
pub const MIN_CHANNEL_NUMBER: u16 = 0x4000;
/// Highest channel number a client may bind.
pub const MAX_CHANNEL_NUMBER: u16 = 0x7fff;

const CHANNEL_NUMBER_SIZE: usize = 4;

/// CHANNEL-NUMBER attribute (RFC 5766 Section 14.1): the 16-bit
/// number followed by two reserved bytes.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub struct ChannelNumber(pub u16);

impl fmt::Display for ChannelNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl ChannelNumber {
    pub fn is_valid(&self) -> bool {
        (MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&self.0)
    }
}

impl Setter for ChannelNumber {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        let mut v = [0u8; CHANNEL_NUMBER_SIZE];
        v[0..2].copy_from_slice(&self.0.to_be_bytes());
        // the final two bytes are RFFU
        m.add(ATTR_CHANNEL_NUMBER, &v);
        Ok(())
    }
}

impl Getter for ChannelNumber {
    fn get_from(&mut self, m: &Message) -> stun::Result<()> {
        let v = m.get(ATTR_CHANNEL_NUMBER)?;
        if v.len() != CHANNEL_NUMBER_SIZE {
            return Err(stun::Error::ErrAttributeSizeInvalid);
        }
        self.0 = u16::from_be_bytes([v[0], v[1]]);
        Ok(())
    }
}
