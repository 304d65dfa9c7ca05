use stun::attributes::ATTR_USE_CANDIDATE;
use stun::message::{Message, Setter};

/// USE-CANDIDATE attribute (RFC 5245 Section 7.1.2.1): zero-length
/// flag the controlling agent sets to nominate the pair being checked.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct UseCandidate;

impl Setter for UseCandidate {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        m.add(ATTR_USE_CANDIDATE, &[]);
        Ok(())
    }
}

impl UseCandidate {
    pub fn is_set(m: &Message) -> bool {
        m.contains(ATTR_USE_CANDIDATE)
    }
}

#[cfg(test)]
mod usecand_test {
    use super::*;
    use stun::message::{TransactionId, BINDING_REQUEST};

    #[test]
    fn test_flag_round_trip() {
        let mut m = Message::new();
        m.build(&[&TransactionId::new(), &BINDING_REQUEST]).unwrap();
        assert!(!UseCandidate::is_set(&m));

        UseCandidate.add_to(&mut m).unwrap();
        let mut decoded = Message {
            raw: m.raw.clone(),
            ..Default::default()
        };
        decoded.decode().unwrap();
        assert!(UseCandidate::is_set(&decoded));
    }
}
