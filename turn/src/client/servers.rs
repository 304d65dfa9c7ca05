
use std::net::SocketAddr;

use stun::message::{Message, StreamParse};
use stun::uri::ProtoType;
use tokio::time::{Duration, Instant};

use crate::error::*;
use crate::proto::chandata::{ChanParse, ChannelData};
use crate::proto::channum::ChannelNumber;

/// Delay between consecutive server candidates becoming eligible for
/// an allocation attempt; gives earlier (better-ranked) servers a head
/// start without serializing the race.
pub(crate) const ACTIVATE_NEXT_SERVER_AFTER: Duration = Duration::from_secs(4);

/// Bound on bytes parked in a server's TCP write queue while the
/// stream is backed up; overflow drops the oldest queued packet.
pub(crate) const MAX_TCP_WRITE_QUEUE_BYTES: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ServerState {
    /// Waiting for its activation slot.
    Staged,
    /// Allocation attempt in progress.
    Activated,
    /// Promoted to the one server carrying the allocation.
    Active,
    /// Removed from the race after a failure.
    Dead,
}

/// One candidate TURN server in the activation race.
pub(crate) struct ServerEntry {
    pub addr: SocketAddr,
    pub proto: ProtoType,
    pub activate_after: Instant,
    pub state: ServerState,
    /// TCP connect completed (always true for UDP entries).
    pub connected: bool,
    /// Reassembly buffer for the TCP byte stream.
    pub stream: StreamBuffer,
}

impl ServerEntry {
    pub fn new(addr: SocketAddr, proto: ProtoType, activate_after: Instant) -> Self {
        ServerEntry {
            addr,
            proto,
            activate_after,
            state: ServerState::Staged,
            connected: proto == ProtoType::Udp,
            stream: StreamBuffer::new(),
        }
    }
}

/// Builds the staggered activation schedule for a resolved server
/// list: entry i becomes eligible at `now + i * 4s`, preserving the
/// SRV-derived order.
pub(crate) fn stagger_entries(
    endpoints: Vec<(SocketAddr, ProtoType)>,
    now: Instant,
) -> Vec<ServerEntry> {
    endpoints
        .into_iter()
        .enumerate()
        .map(|(i, (addr, proto))| {
            ServerEntry::new(addr, proto, now + ACTIVATE_NEXT_SERVER_AFTER * i as u32)
        })
        .collect()
}

/// A frame extracted from the TCP stream shared by STUN messages and
/// ChannelData.
#[derive(Debug)]
pub(crate) enum StreamFrame {
    Stun(Message),
    ChannelData { number: ChannelNumber, data: Vec<u8> },
}

/// Accumulates arbitrary TCP fragments and yields whole frames. The
/// two framings are interleaved on the wire with no separators; the
/// top two bits of the first byte pick the parser (00 STUN, 01
/// ChannelData). A partial frame stays buffered until more bytes
/// arrive; anything else is a protocol violation.
#[derive(Default)]
pub(crate) struct StreamBuffer {
    buf: Vec<u8>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        StreamBuffer::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Extracts the next whole frame, or None if the buffer holds only
    /// a partial one. Returns `MalformedProtocolData` when the buffer
    /// head is neither framing.
    pub fn next_frame(&mut self) -> Result<Option<StreamFrame>> {
        if self.buf.is_empty() {
            return Ok(None);
        }

        match Message::read_stream(&self.buf) {
            StreamParse::Message { message, consumed } => {
                self.buf.drain(..consumed);
                return Ok(Some(StreamFrame::Stun(message)));
            }
            StreamParse::Insufficient => return Ok(None),
            StreamParse::NotStun => {}
        }

        match ChannelData::read_stream(&self.buf) {
            ChanParse::Frame {
                number,
                data,
                consumed,
            } => {
                self.buf.drain(..consumed);
                Ok(Some(StreamFrame::ChannelData { number, data }))
            }
            ChanParse::Insufficient => Ok(None),
            ChanParse::NotChannelData => Err(Error::BogusDataOnSocket),
        }
    }
}
