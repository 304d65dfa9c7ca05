use super::*;
use stun::message::{Message, TransactionId, BINDING_REQUEST};

fn recode(m: &Message) -> Message {
    let mut decoded = Message {
        raw: m.raw.clone(),
        ..Default::default()
    };
    decoded.decode().unwrap();
    decoded
}

#[test]
fn test_controlling_round_trip() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    AttrControl {
        role: Role::Controlling,
        tie_breaker: TieBreaker(0x8000_0000_0000_0000),
    }
    .add_to(&mut m)
    .unwrap();

    let decoded = recode(&m);
    assert!(decoded.contains(stun::attributes::ATTR_ICE_CONTROLLING));
    assert!(!decoded.contains(stun::attributes::ATTR_ICE_CONTROLLED));

    let mut out = AttrControl::default();
    out.get_from(&decoded).unwrap();
    assert_eq!(out.role, Role::Controlling);
    assert_eq!(out.tie_breaker, TieBreaker(0x8000_0000_0000_0000));
}

#[test]
fn test_controlled_round_trip() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    AttrControl {
        role: Role::Controlled,
        tie_breaker: TieBreaker(1),
    }
    .add_to(&mut m)
    .unwrap();

    let mut out = AttrControl::default();
    out.get_from(&recode(&m)).unwrap();
    assert_eq!(out.role, Role::Controlled);
    assert_eq!(out.tie_breaker, TieBreaker(1));
}

#[test]
fn test_absent_role_attribute() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    let mut out = AttrControl::default();
    assert_eq!(
        out.get_from(&m).unwrap_err(),
        stun::Error::ErrAttributeNotFound
    );
}

#[test]
fn test_role_flip() {
    assert_eq!(Role::Controlling.flipped(), Role::Controlled);
    assert_eq!(Role::Controlled.flipped(), Role::Controlling);
}
