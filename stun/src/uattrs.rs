use std::fmt;

use crate::attributes::*;
use crate::error::*;
use crate::message::*;

/// UNKNOWN-ATTRIBUTES attribute (RFC 5389 Section 15.9); carried in
/// 420 responses listing the comprehension-required types the server
/// or client could not process.
#[derive(Default, Debug, PartialEq, Eq)]
pub struct UnknownAttributes(pub Vec<AttrType>);

impl fmt::Display for UnknownAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<nil>")
        } else {
            let s: Vec<String> = self.0.iter().map(|t| t.to_string()).collect();
            write!(f, "{}", s.join(", "))
        }
    }
}

const ATTR_TYPE_SIZE: usize = 2;

impl Setter for UnknownAttributes {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = Vec::with_capacity(ATTR_TYPE_SIZE * self.0.len());
        for t in &self.0 {
            v.extend_from_slice(&t.value().to_be_bytes());
        }
        m.add(ATTR_UNKNOWN_ATTRIBUTES, &v);
        Ok(())
    }
}

impl Getter for UnknownAttributes {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_UNKNOWN_ATTRIBUTES)?;
        if v.len() % ATTR_TYPE_SIZE != 0 {
            return Err(Error::ErrBadUnknownAttrsSize);
        }
        self.0.clear();
        for chunk in v.chunks_exact(ATTR_TYPE_SIZE) {
            self.0.push(AttrType(u16::from_be_bytes([chunk[0], chunk[1]])));
        }
        Ok(())
    }
}
