use super::*;
use crate::message::{Message, TransactionId, BINDING_REQUEST};

#[test]
fn test_attr_type_ranges() {
    assert!(ATTR_USERNAME.required());
    assert!(!ATTR_USERNAME.optional());
    assert!(ATTR_FINGERPRINT.optional());
    assert!(ATTR_MOBILITY_TICKET.optional());
    assert!(ATTR_DONT_FRAGMENT.required());
}

#[test]
fn test_get_all_returns_repeats_in_order() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    m.add(ATTR_XOR_PEER_ADDRESS, b"first000");
    m.add(ATTR_XOR_PEER_ADDRESS, b"second00");

    let all = m.attributes.get_all(ATTR_XOR_PEER_ADDRESS);
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].value, b"first000");
    assert_eq!(all[1].value, b"second00");
}

#[test]
fn test_padding_lengths() {
    assert_eq!(nearest_padded_value_length(0), 0);
    assert_eq!(nearest_padded_value_length(1), 4);
    assert_eq!(nearest_padded_value_length(4), 4);
    assert_eq!(nearest_padded_value_length(5), 8);
}

#[test]
fn test_display_known_and_unknown() {
    assert_eq!(ATTR_XORMAPPED_ADDRESS.to_string(), "XOR-MAPPED-ADDRESS");
    assert_eq!(AttrType(0x7ffe).to_string(), "0x7ffe");
}
