use super::*;
use crate::attributes::{ATTR_PRIORITY, ATTR_SOFTWARE, ATTR_USERNAME};
use crate::textattrs::TextAttribute;

// RFC 5769 Section 2.1, sample request.
pub(crate) const SAMPLE_REQUEST: &str = "\
000100582112a442b7e7a701bc34d686fa87dfae\
802200105354554e207465737420636c69656e74\
002400046e0001ff\
80290008932ff9b151263b36\
000600096576746a3a68367659202020\
000800149aeaa70cbfd8cb56781ef2b5b2d3f249c1b571a2\
80280004e57a3bcf";

// RFC 5769 Section 2.2, sample IPv4 response.
pub(crate) const SAMPLE_RESPONSE_IPV4: &str = "\
0101003c2112a442b7e7a701bc34d686fa87dfae\
8022000b7465737420766563746f7220\
002000080001a147e112a643\
000800142b91f599fd9e90c38c7489f92af9ba53f06be7d7\
80280004c07d4c96";

// RFC 5769 Section 2.3, sample IPv6 response.
pub(crate) const SAMPLE_RESPONSE_IPV6: &str = "\
010100482112a442b7e7a701bc34d686fa87dfae\
8022000b7465737420766563746f7220\
002000140002a1470113a9faa5d3f179bc25f4b5bed2b9d9\
00080014a382954e4be67bf11784c97c8292c275bfe3ed41\
80280004c8fb0b4c";

pub(crate) const SAMPLE_PASSWORD: &str = "VOkJxbRl1RmTxUk/WvJxBt";

pub(crate) fn sample(hex_str: &str) -> Message {
    let mut m = Message {
        raw: hex::decode(hex_str).unwrap(),
        ..Default::default()
    };
    m.decode().unwrap();
    m
}

#[test]
fn test_decode_rfc5769_sample_request() {
    let m = sample(SAMPLE_REQUEST);

    assert_eq!(m.typ.method, METHOD_BINDING);
    assert_eq!(m.typ.class, CLASS_REQUEST);
    assert_eq!(
        m.transaction_id.0,
        hex::decode("b7e7a701bc34d686fa87dfae").unwrap().as_slice()
    );

    let priority = m.get(ATTR_PRIORITY).unwrap();
    assert_eq!(
        u32::from_be_bytes([priority[0], priority[1], priority[2], priority[3]]),
        0x6e0001ff
    );

    let username = TextAttribute::get_from_as(&m, ATTR_USERNAME).unwrap();
    assert_eq!(username.text, "evtj:h6vY");

    let software = TextAttribute::get_from_as(&m, ATTR_SOFTWARE).unwrap();
    assert_eq!(software.text, "STUN test client");
}

#[test]
fn test_is_message() {
    let raw = hex::decode(SAMPLE_REQUEST).unwrap();
    assert!(is_message(&raw));

    // top two bits set -> not STUN
    let mut mangled = raw.clone();
    mangled[0] |= 0xc0;
    assert!(!is_message(&mangled));

    // cookie gone -> not STUN
    let mut no_cookie = raw.clone();
    no_cookie[4] = 0;
    assert!(!is_message(&no_cookie));

    assert!(!is_message(&raw[..MESSAGE_HEADER_SIZE - 1]));
}

#[test]
fn test_decode_rejects_truncated() {
    let raw = hex::decode(SAMPLE_REQUEST).unwrap();
    let mut m = Message {
        raw: raw[..raw.len() - 4].to_vec(),
        ..Default::default()
    };
    assert_eq!(m.decode().unwrap_err(), Error::ErrLengthMismatch);
}

#[test]
fn test_parse_if_stun_silent_on_garbage() {
    assert!(Message::parse_if_stun(b"definitely not stun").is_none());
    assert!(Message::parse_if_stun(&[]).is_none());
    assert!(Message::parse_if_stun(&hex::decode(SAMPLE_REQUEST).unwrap()).is_some());
}

#[test]
fn test_message_type_round_trip() {
    let types = [
        MessageType::new(METHOD_BINDING, CLASS_REQUEST),
        MessageType::new(METHOD_ALLOCATE, CLASS_ERROR_RESPONSE),
        MessageType::new(METHOD_REFRESH, CLASS_SUCCESS_RESPONSE),
        MessageType::new(METHOD_SEND, CLASS_INDICATION),
        MessageType::new(METHOD_DATA, CLASS_INDICATION),
        MessageType::new(METHOD_CREATE_PERMISSION, CLASS_REQUEST),
        MessageType::new(METHOD_CHANNEL_BIND, CLASS_REQUEST),
    ];
    for t in types {
        let mut decoded = MessageType::default();
        decoded.read_value(t.value());
        assert_eq!(decoded, t, "wire value 0x{:04x}", t.value());
    }

    // spot checks against RFC values
    assert_eq!(BINDING_REQUEST.value(), 0x0001);
    assert_eq!(BINDING_SUCCESS.value(), 0x0101);
    assert_eq!(BINDING_ERROR.value(), 0x0111);
    assert_eq!(
        MessageType::new(METHOD_ALLOCATE, CLASS_REQUEST).value(),
        0x0003
    );
}

#[test]
fn test_encode_decode_round_trip() {
    let mut m = Message::new();
    let id = TransactionId::new();
    let username = TextAttribute::new(ATTR_USERNAME, "user:frag".to_owned());
    m.build(&[&id, &BINDING_REQUEST, &username]).unwrap();

    let mut decoded = Message {
        raw: m.raw.clone(),
        ..Default::default()
    };
    decoded.decode().unwrap();
    assert_eq!(decoded, m);
}

#[test]
fn test_add_pads_to_four_bytes() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    m.add(ATTR_USERNAME, b"abcde");
    // 4 header + 5 value + 3 padding
    assert_eq!(m.length, 12);
    assert_eq!(m.raw.len(), MESSAGE_HEADER_SIZE + 12);
    assert_eq!(&m.raw[m.raw.len() - 3..], &[0, 0, 0]);
}

#[test]
fn test_read_stream_whole_message() {
    let raw = hex::decode(SAMPLE_REQUEST).unwrap();
    match Message::read_stream(&raw) {
        StreamParse::Message { message, consumed } => {
            assert_eq!(consumed, raw.len());
            assert_eq!(message.typ, BINDING_REQUEST);
        }
        other => panic!("expected message, got {other:?}"),
    }
}

#[test]
fn test_read_stream_never_consumes_prefix() {
    let raw = hex::decode(SAMPLE_REQUEST).unwrap();
    for cut in 1..raw.len() {
        match Message::read_stream(&raw[..cut]) {
            StreamParse::Insufficient => {}
            other => panic!("prefix of {cut} bytes parsed as {other:?}"),
        }
    }
}

#[test]
fn test_read_stream_not_stun() {
    // 0x40 top bits -> ChannelData, not STUN
    let frame = [0x40u8, 0x01, 0x00, 0x04, 0xde, 0xad, 0xbe, 0xef];
    assert!(matches!(Message::read_stream(&frame), StreamParse::NotStun));
}

#[test]
fn test_unknown_required_attributes_flagged() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    m.add(AttrType(0x7ffe), b"what");

    let mut decoded = Message {
        raw: m.raw.clone(),
        ..Default::default()
    };
    decoded.decode().unwrap();
    assert_eq!(decoded.attributes.unknown_required(), vec![AttrType(0x7ffe)]);

    // comprehension-optional unknowns are fine
    let mut m2 = Message::new();
    m2.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    m2.add(AttrType(0xfffe), b"meh");
    let mut decoded2 = Message {
        raw: m2.raw.clone(),
        ..Default::default()
    };
    decoded2.decode().unwrap();
    assert!(decoded2.attributes.unknown_required().is_empty());
}
