use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;
use tokio::sync::mpsc::error::SendError as MpscSendError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("attribute size is invalid")]
    ErrAttributeSizeInvalid,
    #[error("attribute size overflow")]
    ErrAttributeSizeOverflow,
    #[error("unexpected EOF")]
    ErrUnexpectedEof,
    #[error("not enough bytes to read message header")]
    ErrShortHeader,
    #[error("missing magic cookie")]
    ErrMissingMagicCookie,
    #[error("declared length does not match buffer")]
    ErrLengthMismatch,
    #[error("integrity check failed")]
    ErrIntegrityMismatch,
    #[error("fingerprint check failed")]
    ErrFingerprintMismatch,
    #[error("FINGERPRINT before MESSAGE-INTEGRITY attribute")]
    ErrFingerprintBeforeIntegrity,
    #[error("bad UNKNOWN-ATTRIBUTES size")]
    ErrBadUnknownAttrsSize,
    #[error("message carries unknown comprehension-required attributes")]
    ErrUnknownRequiredAttrs,
    #[error("no default reason for ERROR-CODE")]
    ErrNoDefaultReason,
    #[error("requester with the same transaction id exists")]
    ErrRequesterExists,
    #[error("requester manager is closed")]
    ErrManagerClosed,
    #[error("request timed out")]
    ErrRequestTimeout,
    #[error("request cancelled")]
    ErrRequestCancelled,
    #[error("no STUN servers reachable")]
    ErrNoServersReachable,
    #[error("invalid stun/turn uri")]
    ErrInvalidUri,
    #[error("unknown uri scheme")]
    ErrSchemeType,
    #[error("{0}")]
    Other(String),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("mpsc send: {0}")]
    MpscSend(String),
    #[error("{0}")]
    Util(#[from] util::Error),
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

impl<T> From<MpscSendError<T>> for Error {
    fn from(e: MpscSendError<T>) -> Self {
        Error::MpscSend(e.to_string())
    }
}
