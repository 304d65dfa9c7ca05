use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::*;
use crate::message::{Message, TransactionId, BINDING_SUCCESS};

#[test]
fn test_mapped_address_round_trip_v4() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS]).unwrap();

    let addr = MappedAddress {
        ip: IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)),
        port: 49170,
    };
    addr.add_to(&mut m).unwrap();

    let mut decoded = MappedAddress::default();
    decoded.get_from(&m).unwrap();
    assert_eq!(decoded.ip, addr.ip);
    assert_eq!(decoded.port, addr.port);
}

#[test]
fn test_mapped_address_round_trip_v6() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS]).unwrap();

    let addr = MappedAddress {
        ip: IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
        port: 1234,
    };
    addr.add_to(&mut m).unwrap();

    let mut decoded = MappedAddress::default();
    decoded.get_from(&m).unwrap();
    assert_eq!(decoded.ip, addr.ip);
    assert_eq!(decoded.port, addr.port);
}

#[test]
fn test_mapped_address_bad_family() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_SUCCESS]).unwrap();
    m.add(crate::attributes::ATTR_MAPPED_ADDRESS, &[0, 9, 0, 1, 1, 2, 3, 4]);

    let mut decoded = MappedAddress::default();
    assert!(decoded.get_from(&m).is_err());
}
