use stun::attributes::ATTR_DONT_FRAGMENT;
use stun::message::{Message, Setter};

/// DONT-FRAGMENT attribute (RFC 5766 Section 14.8): zero-length flag
/// asking the server to set DF on relayed datagrams. Servers that do
/// not understand it answer 420 and the client retries without it.
#[derive(Default, PartialEq, Eq, Copy, Clone, Debug)]
pub struct DontFragment;

impl Setter for DontFragment {
    fn add_to(&self, m: &mut Message) -> stun::Result<()> {
        m.add(ATTR_DONT_FRAGMENT, &[]);
        Ok(())
    }
}

impl DontFragment {
    pub fn is_set(m: &Message) -> bool {
        m.contains(ATTR_DONT_FRAGMENT)
    }
}
