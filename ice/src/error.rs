use std::io;
use std::net;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("shut down by user request")]
    UserRequestedShutdown,
    #[error("no interface addresses could be bound")]
    NoAddressesBound,
    #[error("rebind attempt budget exhausted")]
    RebindBudgetExhausted,
    #[error("socket is not ready")]
    NotReady,
    #[error("session has no nominated pair")]
    NoSelectedPair,
    #[error("all candidate pairs failed")]
    AllPairsFailed,
    #[error("remote credentials missing")]
    RemoteCredentialsMissing,
    #[error("check response failed integrity validation")]
    IntegrityCheckFailed,
    #[error("username does not match local credentials")]
    UsernameMismatch,
    #[error("component ids do not match")]
    ComponentMismatch,
    #[error("unexpected socket failure")]
    UnexpectedSocketFailure,
    #[error("malformed protocol data")]
    MalformedProtocolData,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("{0}")]
    Stun(#[from] stun::Error),
    #[error("{0}")]
    Turn(#[from] turn::Error),
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

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}
