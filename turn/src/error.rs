use std::io;
use std::net;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("shut down by user request")]
    UserRequestedShutdown,
    #[error("dns lookup failed")]
    DnsLookupFailure,
    #[error("failed to connect to any server")]
    FailedToConnectToAnyServer,
    #[error("server unreachable")]
    ServerUnreachable,
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("allocation failed")]
    AllocationFailed,
    #[error("allocation refresh timed out")]
    RefreshTimeout,
    #[error("unexpected socket failure")]
    UnexpectedSocketFailure,
    #[error("bogus data received on socket")]
    BogusDataOnSocket,
    #[error("insufficient server capacity")]
    InsufficientServerCapacity,
    #[error("malformed protocol data")]
    MalformedProtocolData,
    #[error("channel number not in the allowed range")]
    InvalidChannelNumber,
    #[error("channelData length does not match payload")]
    BadChannelDataLength,
    #[error("no channel numbers left in the configured range")]
    ChannelRangeExhausted,
    #[error("client is not ready")]
    NotReady,
    #[error("already shut down")]
    AlreadyShutdown,
    #[error("unexpected response type")]
    UnexpectedResponse,
    #[error("stale nonce, retry")]
    TryAgain,
    #[error("unexpected EOF")]
    UnexpectedEof,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Stun(#[from] stun::Error),
    #[error("{0}")]
    Util(#[from] util::Error),
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

// Workaround for wanting Clone for io::Error.
impl Clone for IoError {
    fn clone(&self) -> Self {
        IoError(io::Error::new(self.0.kind(), self.0.to_string()))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
