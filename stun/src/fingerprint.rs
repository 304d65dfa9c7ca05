
use crc::{Crc, CRC_32_ISO_HDLC};

use crate::attributes::*;
use crate::checks::check_fingerprint;
use crate::error::*;
use crate::message::*;

/// FINGERPRINT attribute (RFC 5389 Section 15.5).
pub struct FingerprintAttr;

/// Shorthand setter, `FINGERPRINT.add_to(&mut m)`.
pub const FINGERPRINT: FingerprintAttr = FingerprintAttr {};

pub const FINGERPRINT_XOR_VALUE: u32 = 0x5354554e;
pub const FINGERPRINT_SIZE: usize = 4;

/// CRC-32 of b XORed with 0x5354554e, so a fingerprinted STUN message
/// stays distinguishable from application packets that also end in a
/// CRC-32.
pub fn fingerprint_value(b: &[u8]) -> u32 {
    Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(b) ^ FINGERPRINT_XOR_VALUE
}

impl Setter for FingerprintAttr {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let original_length = m.length;
        // the CRC input length field covers the fingerprint TLV itself
        m.length += (FINGERPRINT_SIZE + ATTRIBUTE_HEADER_SIZE) as u32;
        m.write_length();
        let value = fingerprint_value(&m.raw);
        m.length = original_length;

        m.add(ATTR_FINGERPRINT, &value.to_be_bytes());
        Ok(())
    }
}

impl FingerprintAttr {
    /// Reads the fingerprint from m and validates it over the
    /// preceding bytes.
    pub fn check(&self, m: &Message) -> Result<()> {
        let b = m.get(ATTR_FINGERPRINT)?;
        crate::checks::check_size(ATTR_FINGERPRINT, b.len(), FINGERPRINT_SIZE)?;

        let received = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let attr_start = m.raw.len() - (FINGERPRINT_SIZE + ATTRIBUTE_HEADER_SIZE);
        let expected = fingerprint_value(&m.raw[..attr_start]);
        check_fingerprint(received, expected)
    }
}

impl Checker for FingerprintAttr {
    fn check(&self, m: &Message) -> Result<()> {
        FingerprintAttr::check(self, m)
    }
}
