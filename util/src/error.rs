use std::io;
use std::net;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: full")]
    ErrBufferFull,
    #[error("buffer: short buffer")]
    ErrBufferShort,
    #[error("use of closed network connection")]
    ErrClosed,
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("no interface addresses available")]
    ErrNoInterfaceAddresses,
    #[error("dns: name not found")]
    ErrDnsNameNotFound,
    #[error("dns: no records of requested type")]
    ErrDnsNoRecords,
    #[error("parse addr: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("{0}")]
    Io(#[source] IoError),
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
