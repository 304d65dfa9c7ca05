#![warn(rust_2018_idioms)]

//! NAT-traversal transport core for real-time peer-to-peer services:
//! a STUN codec and requester layer, a TURN client with server
//! failover, and an ICE socket/session pair, with a thin seam for a
//! reliable datagram stream on top.

pub mod rudp;

pub use ice;
pub use stun;
pub use turn;
pub use util;

pub use ice::candidate::{Candidate, CandidateType};
pub use ice::control::Role;
pub use ice::session::{IceSession, IceSessionConfig, IceSessionObserver};
pub use ice::socket::{IceSocket, IceSocketConfig, IceSocketObserver};
pub use ice::state::{IceSessionState, IceSocketState};
pub use turn::{TurnClient, TurnClientConfig, TurnClientObserver, TurnClientState};
pub use util::dns::{Resolver, SrvLookupType, StaticResolver, SystemResolver};
