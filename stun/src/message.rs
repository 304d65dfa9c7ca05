#[cfg(test)]
pub(crate) mod message_test;

use std::fmt;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::Rng;

use crate::attributes::*;
use crate::error::*;

/// Fixed value distinguishing STUN packets from other protocols
/// multiplexed on the same port; always 0x2112A442 in network order.
pub const MAGIC_COOKIE: u32 = 0x2112A442;
pub const ATTRIBUTE_HEADER_SIZE: usize = 4;
pub const MESSAGE_HEADER_SIZE: usize = 20;
pub const TRANSACTION_ID_SIZE: usize = 12; // 96 bit

/// Adds itself to a message being built.
pub trait Setter {
    fn add_to(&self, m: &mut Message) -> Result<()>;
}

/// Parses itself from a decoded message.
pub trait Getter {
    fn get_from(&mut self, m: &Message) -> Result<()>;
}

/// Validates an aspect of a decoded message.
pub trait Checker {
    fn check(&self, m: &Message) -> Result<()>;
}

/// 96-bit request correlation id, unique per outstanding request
/// within a client.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Default, Debug)]
pub struct TransactionId(pub [u8; TRANSACTION_ID_SIZE]);

impl TransactionId {
    pub fn new() -> Self {
        let mut id = TransactionId([0u8; TRANSACTION_ID_SIZE]);
        rand::thread_rng().fill(&mut id.0);
        id
    }

    /// Short printable form for logging.
    pub fn key(&self) -> String {
        BASE64_STANDARD.encode(self.0)
    }
}

impl Setter for TransactionId {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.transaction_id = *self;
        m.write_transaction_id();
        Ok(())
    }
}

/// Quick membership test for demultiplexing: size, class bits and
/// magic cookie. Does not guarantee that a full decode will succeed.
pub fn is_message(b: &[u8]) -> bool {
    b.len() >= MESSAGE_HEADER_SIZE
        && b[0] & 0xc0 == 0
        && u32::from_be_bytes([b[4], b[5], b[6], b[7]]) == MAGIC_COOKIE
}

/// Outcome of the look-ahead parse over a TCP reassembly buffer.
#[derive(Debug)]
pub enum StreamParse {
    /// The buffer head is not a STUN message.
    NotStun,
    /// Could be a STUN message but more bytes are needed; nothing was
    /// consumed.
    Insufficient,
    /// One whole message decoded; `consumed` bytes must be drained.
    Message { message: Message, consumed: usize },
}

/// A single STUN packet. The decoded view (`typ`, `transaction_id`,
/// `attributes`) and the wire bytes (`raw`) are kept in sync by the
/// encode/decode entry points; attribute values are only valid against
/// the current `raw`.
#[derive(Default, Debug, Clone)]
pub struct Message {
    pub typ: MessageType,
    pub length: u32, // len(raw) not including header
    pub transaction_id: TransactionId,
    pub attributes: Attributes,
    pub raw: Vec<u8>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} l={} attrs={} id={}",
            self.typ,
            self.length,
            self.attributes.0.len(),
            self.transaction_id.key(),
        )
    }
}

// Equality ignores raw so that a rebuilt message compares equal to its
// decoded original.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ
            && self.transaction_id == other.transaction_id
            && self.length == other.length
            && self.attributes == other.attributes
    }
}

const DEFAULT_RAW_CAPACITY: usize = 120;

impl Message {
    pub fn new() -> Self {
        Message {
            raw: {
                let mut raw = Vec::with_capacity(DEFAULT_RAW_CAPACITY);
                raw.extend_from_slice(&[0; MESSAGE_HEADER_SIZE]);
                raw
            },
            ..Default::default()
        }
    }

    /// Resets the message and applies setters in order, returning on
    /// the first error.
    pub fn build(&mut self, setters: &[&dyn Setter]) -> Result<()> {
        self.reset();
        self.write_header();
        for s in setters {
            s.add_to(self)?;
        }
        Ok(())
    }

    /// Applies checkers in order, returning on the first error.
    pub fn check(&self, checkers: &[&dyn Checker]) -> Result<()> {
        for c in checkers {
            c.check(self)?;
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.raw.clear();
        self.raw.extend_from_slice(&[0; MESSAGE_HEADER_SIZE]);
        self.length = 0;
        self.attributes.0.clear();
    }

    /// Ensures the internal buffer holds at least n bytes.
    fn grow(&mut self, n: usize) {
        if self.raw.len() < n {
            self.raw.resize(n, 0);
        }
    }

    /// Appends a new attribute TLV, zero-padding the value to a 4-byte
    /// boundary. The value is copied.
    pub fn add(&mut self, t: AttrType, v: &[u8]) {
        let alloc_size = ATTRIBUTE_HEADER_SIZE + v.len();
        let first = MESSAGE_HEADER_SIZE + self.length as usize;
        let mut last = first + alloc_size;
        self.grow(last);
        self.length += alloc_size as u32;

        let buf = &mut self.raw[first..last];
        buf[0..2].copy_from_slice(&t.value().to_be_bytes());
        buf[2..4].copy_from_slice(&(v.len() as u16).to_be_bytes());
        buf[ATTRIBUTE_HEADER_SIZE..].copy_from_slice(v);

        if v.len() % PADDING != 0 {
            let padded = nearest_padded_value_length(v.len());
            let pad = padded - v.len();
            last += pad;
            self.grow(last);
            // zero the padding so stale buffer bytes never leak
            for b in &mut self.raw[last - pad..last] {
                *b = 0;
            }
            self.length += pad as u32;
        }

        self.attributes.0.push(RawAttribute {
            typ: t,
            length: v.len() as u16,
            value: v.to_vec(),
        });
        self.write_length();
    }

    /// Returns the value of the first attribute of type t.
    pub fn get(&self, t: AttrType) -> Result<Vec<u8>> {
        self.attributes
            .get(t)
            .map(|a| a.value.clone())
            .ok_or(Error::ErrAttributeNotFound)
    }

    pub fn contains(&self, t: AttrType) -> bool {
        self.attributes.get(t).is_some()
    }

    pub fn write_length(&mut self) {
        self.grow(4);
        self.raw[2..4].copy_from_slice(&(self.length as u16).to_be_bytes());
    }

    pub fn write_type(&mut self) {
        self.grow(2);
        self.raw[..2].copy_from_slice(&self.typ.value().to_be_bytes());
    }

    pub fn write_transaction_id(&mut self) {
        self.grow(MESSAGE_HEADER_SIZE);
        self.raw[8..MESSAGE_HEADER_SIZE].copy_from_slice(&self.transaction_id.0);
    }

    pub fn write_header(&mut self) {
        self.grow(MESSAGE_HEADER_SIZE);
        self.write_type();
        self.write_length();
        self.raw[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        self.write_transaction_id();
    }

    pub fn set_type(&mut self, t: MessageType) {
        self.typ = t;
        self.write_type();
    }

    pub fn new_transaction_id(&mut self) {
        self.transaction_id = TransactionId::new();
        self.write_transaction_id();
    }

    /// Decodes `raw` into the structured view.
    pub fn decode(&mut self) -> Result<()> {
        let buf = &self.raw;
        if buf.len() < MESSAGE_HEADER_SIZE {
            return Err(Error::ErrShortHeader);
        }

        let t = u16::from_be_bytes([buf[0], buf[1]]);
        let size = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let full_size = MESSAGE_HEADER_SIZE + size;

        if cookie != MAGIC_COOKIE {
            return Err(Error::ErrMissingMagicCookie);
        }
        if buf.len() < full_size {
            return Err(Error::ErrLengthMismatch);
        }

        self.typ.read_value(t);
        self.length = size as u32;
        self.transaction_id
            .0
            .copy_from_slice(&buf[8..MESSAGE_HEADER_SIZE]);

        self.attributes.0.clear();
        let mut b = &buf[MESSAGE_HEADER_SIZE..full_size];
        while !b.is_empty() {
            if b.len() < ATTRIBUTE_HEADER_SIZE {
                return Err(Error::ErrLengthMismatch);
            }
            let typ = AttrType(u16::from_be_bytes([b[0], b[1]]));
            let length = u16::from_be_bytes([b[2], b[3]]);
            let padded = nearest_padded_value_length(length as usize);

            b = &b[ATTRIBUTE_HEADER_SIZE..];
            if b.len() < padded {
                return Err(Error::ErrLengthMismatch);
            }
            self.attributes.0.push(RawAttribute {
                typ,
                length,
                value: b[..length as usize].to_vec(),
            });
            b = &b[padded..];
        }

        Ok(())
    }

    /// Silent parse used by the demultiplexer: anything that is not a
    /// well-formed STUN message yields None.
    pub fn parse_if_stun(data: &[u8]) -> Option<Message> {
        if !is_message(data) {
            return None;
        }
        let mut m = Message {
            raw: data.to_vec(),
            ..Default::default()
        };
        m.decode().ok()?;
        Some(m)
    }

    /// Look-ahead parse for stream transports. Never reports a message
    /// before all of its declared bytes are present, and never consumes
    /// bytes on `NotStun`/`Insufficient`.
    pub fn read_stream(data: &[u8]) -> StreamParse {
        if data.is_empty() {
            return StreamParse::Insufficient;
        }
        if data[0] & 0xc0 != 0 {
            return StreamParse::NotStun;
        }
        if data.len() < MESSAGE_HEADER_SIZE {
            return StreamParse::Insufficient;
        }
        if u32::from_be_bytes([data[4], data[5], data[6], data[7]]) != MAGIC_COOKIE {
            return StreamParse::NotStun;
        }

        let size = u16::from_be_bytes([data[2], data[3]]) as usize;
        let full_size = MESSAGE_HEADER_SIZE + size;
        if data.len() < full_size {
            return StreamParse::Insufficient;
        }

        let mut m = Message {
            raw: data[..full_size].to_vec(),
            ..Default::default()
        };
        match m.decode() {
            Ok(()) => StreamParse::Message {
                message: m,
                consumed: full_size,
            },
            Err(_) => StreamParse::NotStun,
        }
    }

    /// Copies this message into `b`, re-decoding so that `b` owns an
    /// independent buffer.
    pub fn clone_to(&self, b: &mut Message) -> Result<()> {
        b.raw.clear();
        b.raw.extend_from_slice(&self.raw);
        b.decode()
    }
}

/// 2-bit STUN message class, stored in its 8-bit representation.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct MessageClass(pub(crate) u8);

pub const CLASS_REQUEST: MessageClass = MessageClass(0x00);
pub const CLASS_INDICATION: MessageClass = MessageClass(0x01);
pub const CLASS_SUCCESS_RESPONSE: MessageClass = MessageClass(0x02);
pub const CLASS_ERROR_RESPONSE: MessageClass = MessageClass(0x03);

impl fmt::Display for MessageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            CLASS_REQUEST => "request",
            CLASS_INDICATION => "indication",
            CLASS_SUCCESS_RESPONSE => "success response",
            CLASS_ERROR_RESPONSE => "error response",
            _ => "unknown message class",
        };
        write!(f, "{s}")
    }
}

/// 12-bit STUN method.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct Method(pub(crate) u16);

pub const METHOD_BINDING: Method = Method(0x001);
pub const METHOD_ALLOCATE: Method = Method(0x003);
pub const METHOD_REFRESH: Method = Method(0x004);
pub const METHOD_SEND: Method = Method(0x006);
pub const METHOD_DATA: Method = Method(0x007);
pub const METHOD_CREATE_PERMISSION: Method = Method(0x008);
pub const METHOD_CHANNEL_BIND: Method = Method(0x009);

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = format!("0x{:x}", self.0);

        let s = match *self {
            METHOD_BINDING => "Binding",
            METHOD_ALLOCATE => "Allocate",
            METHOD_REFRESH => "Refresh",
            METHOD_SEND => "Send",
            METHOD_DATA => "Data",
            METHOD_CREATE_PERMISSION => "CreatePermission",
            METHOD_CHANNEL_BIND => "ChannelBind",
            _ => unknown.as_str(),
        };

        write!(f, "{s}")
    }
}

/// STUN message type field: method plus class.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub struct MessageType {
    pub method: Method,
    pub class: MessageClass,
}

pub const BINDING_REQUEST: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_REQUEST,
};
pub const BINDING_SUCCESS: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_SUCCESS_RESPONSE,
};
pub const BINDING_ERROR: MessageType = MessageType {
    method: METHOD_BINDING,
    class: CLASS_ERROR_RESPONSE,
};

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.class)
    }
}

// The 12 method bits are interleaved with the 2 class bits:
//
//  0                 1
//  2  3  4 5 6 7 8 9 0 1 2 3 4 5
// +--+--+-+-+-+-+-+-+-+-+-+-+-+-+
// |M |M |M|M|M|C|M|M|M|C|M|M|M|M|
// |11|10|9|8|7|1|6|5|4|0|3|2|1|0|
// +--+--+-+-+-+-+-+-+-+-+-+-+-+-+
const METHOD_ABITS: u16 = 0x000f; // M0-M3
const METHOD_BBITS: u16 = 0x0070; // M4-M6
const METHOD_DBITS: u16 = 0x0f80; // M7-M11

const METHOD_BSHIFT: u16 = 1;
const METHOD_DSHIFT: u16 = 2;

const C0BIT: u16 = 0x1;
const C1BIT: u16 = 0x2;

const CLASS_C0SHIFT: u16 = 4;
const CLASS_C1SHIFT: u16 = 7;

impl Setter for MessageType {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.set_type(*self);
        Ok(())
    }
}

impl MessageType {
    pub fn new(method: Method, class: MessageClass) -> Self {
        MessageType { method, class }
    }

    /// Packs method and class into the 14-bit wire representation.
    pub fn value(&self) -> u16 {
        let method = self.method.0;
        let a = method & METHOD_ABITS;
        let b = method & METHOD_BBITS;
        let d = method & METHOD_DBITS;
        let method = a + (b << METHOD_BSHIFT) + (d << METHOD_DSHIFT);

        let c = self.class.0 as u16;
        let class = ((c & C0BIT) << CLASS_C0SHIFT) + ((c & C1BIT) << CLASS_C1SHIFT);

        method + class
    }

    /// Unpacks the wire representation.
    pub fn read_value(&mut self, value: u16) {
        let c0 = (value >> CLASS_C0SHIFT) & C0BIT;
        let c1 = (value >> CLASS_C1SHIFT) & C1BIT;
        self.class = MessageClass((c0 + c1) as u8);

        let a = value & METHOD_ABITS;
        let b = (value >> METHOD_BSHIFT) & METHOD_BBITS;
        let d = (value >> METHOD_DSHIFT) & METHOD_DBITS;
        self.method = Method(a + b + d);
    }
}
