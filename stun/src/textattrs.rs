use std::fmt;

use crate::attributes::*;
use crate::checks::check_overflow;
use crate::error::*;
use crate::message::*;

const MAX_USERNAME_B: usize = 513;
const MAX_REALM_B: usize = 763;
const MAX_SOFTWARE_B: usize = 763;
const MAX_NONCE_B: usize = 763;

/// USERNAME attribute (RFC 5389 Section 15.3).
pub type Username = TextAttribute;

/// REALM attribute (RFC 5389 Section 15.7).
pub type Realm = TextAttribute;

/// NONCE attribute (RFC 5389 Section 15.8).
pub type Nonce = TextAttribute;

/// SOFTWARE attribute (RFC 5389 Section 15.10).
pub type Software = TextAttribute;

/// Helper for the length-limited text attributes.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct TextAttribute {
    pub attr: AttrType,
    pub text: String,
}

impl fmt::Display for TextAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

fn max_len(attr: AttrType) -> Result<usize> {
    match attr {
        ATTR_USERNAME => Ok(MAX_USERNAME_B),
        ATTR_REALM => Ok(MAX_REALM_B),
        ATTR_SOFTWARE => Ok(MAX_SOFTWARE_B),
        ATTR_NONCE => Ok(MAX_NONCE_B),
        _ => Err(Error::Other(format!("not a text attribute: {attr}"))),
    }
}

impl Setter for TextAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let text = self.text.as_bytes();
        check_overflow(self.attr, text.len(), max_len(self.attr)?)?;
        m.add(self.attr, text);
        Ok(())
    }
}

impl Getter for TextAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        *self = TextAttribute::get_from_as(m, self.attr)?;
        Ok(())
    }
}

impl TextAttribute {
    pub fn new(attr: AttrType, text: String) -> Self {
        TextAttribute { attr, text }
    }

    pub fn get_from_as(m: &Message, attr: AttrType) -> Result<Self> {
        max_len(attr)?;
        let text = String::from_utf8(m.get(attr)?)?;
        Ok(TextAttribute { attr, text })
    }
}
