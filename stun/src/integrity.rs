#[cfg(test)]
mod integrity_test;

use std::fmt;

use md5::{Digest, Md5};
use ring::hmac;

use crate::attributes::*;
use crate::checks::check_hmac;
use crate::error::*;
use crate::message::*;

pub(crate) const CREDENTIALS_SEP: &str = ":";
pub(crate) const MESSAGE_INTEGRITY_SIZE: usize = 20;

/// MESSAGE-INTEGRITY attribute (RFC 5389 Section 15.4): HMAC-SHA1 over
/// the message up to (and excluding) this attribute, with the length
/// field adjusted to include it.
///
/// The held bytes are the HMAC key: MD5(user:realm:pass) for the
/// long-term credential mechanism, the raw password for short-term.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct MessageIntegrity(pub Vec<u8>);

fn hmac_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    hmac::sign(&key, message).as_ref().to_vec()
}

impl fmt::Debug for MessageIntegrity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // never print key material
        write!(f, "MessageIntegrity(len={})", self.0.len())
    }
}

impl MessageIntegrity {
    /// Key for the long-term credential mechanism. Username, realm and
    /// password must already be SASL-prepared.
    pub fn new_long_term(username: &str, realm: &str, password: &str) -> Self {
        let joined = [username, realm, password].join(CREDENTIALS_SEP);
        let mut h = Md5::new();
        h.update(joined.as_bytes());
        MessageIntegrity(h.finalize().to_vec())
    }

    /// Key for the short-term credential mechanism: the password
    /// itself.
    pub fn new_short_term(password: &str) -> Self {
        MessageIntegrity(password.as_bytes().to_vec())
    }

    /// Recomputes the HMAC over the received bytes and compares. Any
    /// attributes after MESSAGE-INTEGRITY (FINGERPRINT) are excluded by
    /// rewinding the length field exactly as the sender did.
    pub fn check(&self, m: &mut Message) -> Result<()> {
        let received = m.get(ATTR_MESSAGE_INTEGRITY)?;

        let original_length = m.length;
        let mut trailing = 0usize;
        let mut seen_integrity = false;
        for a in &m.attributes.0 {
            if seen_integrity {
                trailing += ATTRIBUTE_HEADER_SIZE + nearest_padded_value_length(a.length as usize);
            }
            if a.typ == ATTR_MESSAGE_INTEGRITY {
                seen_integrity = true;
            }
        }

        m.length -= trailing as u32;
        m.write_length();
        let hmac_end = MESSAGE_HEADER_SIZE + m.length as usize
            - (ATTRIBUTE_HEADER_SIZE + MESSAGE_INTEGRITY_SIZE);
        let expected = hmac_sha1(&self.0, &m.raw[..hmac_end]);
        m.length = original_length;
        m.write_length();

        check_hmac(&received, &expected)
    }
}

impl Setter for MessageIntegrity {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        // FINGERPRINT must stay the final attribute.
        if m.contains(ATTR_FINGERPRINT) {
            return Err(Error::ErrFingerprintBeforeIntegrity);
        }

        let original_length = m.length;
        // the HMAC input length field covers the integrity TLV itself
        m.length += (MESSAGE_INTEGRITY_SIZE + ATTRIBUTE_HEADER_SIZE) as u32;
        m.write_length();
        let v = hmac_sha1(&self.0, &m.raw);
        m.length = original_length;

        m.add(ATTR_MESSAGE_INTEGRITY, &v);
        Ok(())
    }
}
