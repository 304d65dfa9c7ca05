
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::Serialize;

/// Local preference ceiling; earlier-enumerated interfaces get higher
/// values.
pub const LOCAL_PREFERENCE_MAX: u16 = 0xffff;

/// The kind of transport address a candidate advertises.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CandidateType {
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    #[serde(rename = "relay")]
    Relayed,
}

impl CandidateType {
    /// Type preference per RFC 5245 Section 4.1.2.2.
    pub const fn preference(self) -> u8 {
        match self {
            CandidateType::Host => 126,
            CandidateType::PeerReflexive => 110,
            CandidateType::ServerReflexive => 100,
            CandidateType::Relayed => 0,
        }
    }

    fn label(self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::ServerReflexive => "srflx",
            CandidateType::PeerReflexive => "prflx",
            CandidateType::Relayed => "relay",
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One transport address offered to connectivity checks.
///
/// Equality covers (type, foundation, address, priority, component):
/// two candidates equal under it are interchangeable and deduplicate
/// to one.
#[derive(Clone, Debug, Serialize)]
pub struct Candidate {
    pub typ: CandidateType,
    pub addr: SocketAddr,
    /// The address this one was derived from (base for reflexive,
    /// mapped address for relayed); diagnostics only.
    pub related: Option<SocketAddr>,
    pub foundation: String,
    pub priority: u32,
    pub component: u16,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.typ == other.typ
            && self.foundation == other.foundation
            && self.addr == other.addr
            && self.priority == other.priority
            && self.component == other.component
    }
}

impl Eq for Candidate {}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} prio {} component {}",
            self.foundation, self.typ, self.addr, self.priority, self.component
        )?;
        if let Some(related) = self.related {
            write!(f, " related {related}")?;
        }
        Ok(())
    }
}

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Foundation per RFC 5245 Section 4.1.1.3, reduced to a stable hash
/// over the inputs that matter here: same ufrag, same base address and
/// same type always produce the same foundation.
pub fn compute_foundation(ufrag: &str, base: IpAddr, typ: CandidateType) -> String {
    let mut digest = CRC.digest();
    digest.update(ufrag.as_bytes());
    digest.update(base.to_string().as_bytes());
    digest.update(typ.label().as_bytes());
    format!("{:08x}", digest.finalize())
}

/// Candidate priority per RFC 5245 Section 4.1.2.1:
/// type preference in the top byte, local preference in the middle
/// 16 bits, then (256 - component id).
pub fn compute_priority(typ: CandidateType, local_preference: u16, component: u16) -> u32 {
    (typ.preference() as u32) << 24
        | (local_preference as u32) << 8
        | (256u32.saturating_sub(component as u32)) & 0xff
}

impl Candidate {
    pub fn host(addr: SocketAddr, component: u16, local_preference: u16, ufrag: &str) -> Self {
        Candidate {
            typ: CandidateType::Host,
            addr,
            related: None,
            foundation: compute_foundation(ufrag, addr.ip(), CandidateType::Host),
            priority: compute_priority(CandidateType::Host, local_preference, component),
            component,
        }
    }

    pub fn server_reflexive(
        addr: SocketAddr,
        base: SocketAddr,
        component: u16,
        local_preference: u16,
        ufrag: &str,
    ) -> Self {
        Candidate {
            typ: CandidateType::ServerReflexive,
            addr,
            related: Some(base),
            foundation: compute_foundation(ufrag, base.ip(), CandidateType::ServerReflexive),
            priority: compute_priority(CandidateType::ServerReflexive, local_preference, component),
            component,
        }
    }

    pub fn peer_reflexive(
        addr: SocketAddr,
        base: SocketAddr,
        component: u16,
        priority: u32,
        ufrag: &str,
    ) -> Self {
        Candidate {
            typ: CandidateType::PeerReflexive,
            addr,
            related: Some(base),
            foundation: compute_foundation(ufrag, base.ip(), CandidateType::PeerReflexive),
            priority,
            component,
        }
    }

    pub fn relayed(
        addr: SocketAddr,
        reflexive: Option<SocketAddr>,
        component: u16,
        local_preference: u16,
        ufrag: &str,
    ) -> Self {
        Candidate {
            typ: CandidateType::Relayed,
            addr,
            related: reflexive,
            foundation: compute_foundation(ufrag, addr.ip(), CandidateType::Relayed),
            priority: compute_priority(CandidateType::Relayed, local_preference, component),
            component,
        }
    }

    /// The priority this host would have as a peer-reflexive
    /// candidate, carried in check requests so the remote can
    /// construct one (RFC 5245 Section 7.1.2.1).
    pub fn peer_reflexive_priority(&self) -> u32 {
        compute_priority(
            CandidateType::PeerReflexive,
            LOCAL_PREFERENCE_MAX,
            self.component,
        )
    }
}

/// Stable emission order: priority descending, ties broken by type
/// then address text.
pub fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.typ.cmp(&b.typ))
            .then(a.addr.to_string().cmp(&b.addr.to_string()))
    });
}

/// Removes duplicates under candidate equality, keeping first
/// occurrences.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !out.contains(&candidate) {
            out.push(candidate);
        }
    }
    out
}

/// CRC-32 over the sorted candidate tuples; used to detect list
/// changes without diffing. Recomputing over an unchanged list yields
/// the same value.
pub fn list_fingerprint(candidates: &[Candidate]) -> u32 {
    let mut sorted = candidates.to_vec();
    sort_candidates(&mut sorted);

    let mut digest = CRC.digest();
    for c in &sorted {
        digest.update(c.typ.label().as_bytes());
        digest.update(c.addr.to_string().as_bytes());
        if let Some(related) = c.related {
            digest.update(related.to_string().as_bytes());
        }
        digest.update(&c.priority.to_be_bytes());
        digest.update(c.foundation.as_bytes());
        digest.update(&c.component.to_be_bytes());
    }
    digest.finalize()
}
