use super::*;
use crate::message::message_test::{
    sample, SAMPLE_PASSWORD, SAMPLE_REQUEST, SAMPLE_RESPONSE_IPV4, SAMPLE_RESPONSE_IPV6,
};
use crate::message::{Message, TransactionId, BINDING_REQUEST};
use crate::textattrs::TextAttribute;

#[test]
fn test_rfc5769_request_integrity_validates() {
    let mut m = sample(SAMPLE_REQUEST);
    let integrity = MessageIntegrity::new_short_term(SAMPLE_PASSWORD);
    integrity.check(&mut m).unwrap();
}

#[test]
fn test_rfc5769_responses_integrity_validates() {
    for vector in [SAMPLE_RESPONSE_IPV4, SAMPLE_RESPONSE_IPV6] {
        let mut m = sample(vector);
        let integrity = MessageIntegrity::new_short_term(SAMPLE_PASSWORD);
        integrity.check(&mut m).unwrap();
    }
}

#[test]
fn test_wrong_password_rejected() {
    let mut m = sample(SAMPLE_REQUEST);
    let integrity = MessageIntegrity::new_short_term("not the password");
    assert_eq!(
        integrity.check(&mut m).unwrap_err(),
        Error::ErrIntegrityMismatch
    );
}

#[test]
fn test_long_term_key_is_md5_of_credentials() {
    // MD5("user:realm:pass") per RFC 5389 Section 15.4
    let integrity = MessageIntegrity::new_long_term("user", "realm", "pass");
    assert_eq!(
        hex::encode(&integrity.0),
        "8493fbc53ba582fb4c044c456bdc40eb"
    );
}

#[test]
fn test_add_to_then_check_round_trip() {
    let mut m = Message::new();
    let username = TextAttribute::new(crate::attributes::ATTR_USERNAME, "abc:def".to_owned());
    let integrity = MessageIntegrity::new_short_term("swordfish");
    m.build(&[&TransactionId::new(), &BINDING_REQUEST, &username, &integrity])
        .unwrap();

    let mut decoded = Message {
        raw: m.raw.clone(),
        ..Default::default()
    };
    decoded.decode().unwrap();
    integrity.check(&mut decoded).unwrap();
}

#[test]
fn test_integrity_refuses_to_follow_fingerprint() {
    let mut m = Message::new();
    m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
    crate::fingerprint::FINGERPRINT.add_to(&mut m).unwrap();

    let integrity = MessageIntegrity::new_short_term("pw");
    assert_eq!(
        integrity.add_to(&mut m).unwrap_err(),
        Error::ErrFingerprintBeforeIntegrity
    );
}

#[test]
fn test_check_restores_length_field() {
    let mut m = sample(SAMPLE_REQUEST);
    let before = m.length;
    let integrity = MessageIntegrity::new_short_term(SAMPLE_PASSWORD);
    integrity.check(&mut m).unwrap();
    assert_eq!(m.length, before);
    assert_eq!(
        u16::from_be_bytes([m.raw[2], m.raw[3]]) as u32,
        before
    );
}
