use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::*;
use crate::message::message_test::{sample, SAMPLE_RESPONSE_IPV4, SAMPLE_RESPONSE_IPV6};
use crate::message::{Message, TransactionId, BINDING_SUCCESS};

#[test]
fn test_decode_rfc5769_ipv4_response() {
    let m = sample(SAMPLE_RESPONSE_IPV4);
    let mut addr = XorMappedAddress::default();
    addr.get_from(&m).unwrap();
    assert_eq!(addr.ip, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    assert_eq!(addr.port, 32853);
}

#[test]
fn test_decode_rfc5769_ipv6_response() {
    let m = sample(SAMPLE_RESPONSE_IPV6);
    let mut addr = XorMappedAddress::default();
    addr.get_from(&m).unwrap();
    assert_eq!(
        addr.ip,
        IpAddr::V6(Ipv6Addr::new(
            0x2001, 0xdb8, 0x1234, 0x5678, 0x11, 0x2233, 0x4455, 0x6677
        ))
    );
    assert_eq!(addr.port, 32853);
}

#[test]
fn test_xor_round_trip_v4() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS]).unwrap();

    let addr = XorMappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)),
        port: 61000,
    };
    addr.add_to(&mut m).unwrap();

    let mut decoded = XorMappedAddress::default();
    decoded.get_from(&m).unwrap();
    assert_eq!(decoded.ip, addr.ip);
    assert_eq!(decoded.port, addr.port);
}

#[test]
fn test_xor_round_trip_v6_uses_transaction_id() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS]).unwrap();

    let addr = XorMappedAddress {
        ip: IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x42)),
        port: 4242,
    };
    addr.add_to(&mut m).unwrap();

    let mut decoded = XorMappedAddress::default();
    decoded.get_from(&m).unwrap();
    assert_eq!(decoded.ip, addr.ip);
    assert_eq!(decoded.port, addr.port);

    // decoding under a different transaction id must not yield the
    // original address
    let mut other = Message::new();
    other
        .build(&[&TransactionId::new(), &BINDING_SUCCESS])
        .unwrap();
    let raw_attr = m.attributes.get(crate::attributes::ATTR_XORMAPPED_ADDRESS).unwrap();
    other.add(crate::attributes::ATTR_XORMAPPED_ADDRESS, &raw_attr.value);
    let mut wrong = XorMappedAddress::default();
    wrong.get_from(&other).unwrap();
    assert_ne!(wrong.ip, addr.ip);
}
