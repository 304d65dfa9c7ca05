use std::collections::HashMap;
use std::fmt;

use crate::attributes::*;
use crate::checks::check_overflow;
use crate::error::*;
use crate::message::*;

/// ERROR-CODE attribute (RFC 5389 Section 15.6).
#[derive(Default, Debug, PartialEq, Eq)]
pub struct ErrorCodeAttribute {
    pub code: ErrorCode,
    pub reason: String,
}

impl fmt::Display for ErrorCodeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.0, self.reason)
    }
}

const ERROR_CODE_CLASS_BYTE: usize = 2;
const ERROR_CODE_NUMBER_BYTE: usize = 3;
const ERROR_CODE_REASON_START: usize = 4;
const ERROR_CODE_REASON_MAX_B: usize = 763;
const ERROR_CODE_MODULO: u16 = 100;

impl Setter for ErrorCodeAttribute {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let reason = self.reason.as_bytes();
        check_overflow(
            ATTR_ERROR_CODE,
            reason.len() + ERROR_CODE_REASON_START,
            ERROR_CODE_REASON_MAX_B + ERROR_CODE_REASON_START,
        )?;

        let mut value: Vec<u8> = Vec::with_capacity(ERROR_CODE_REASON_START + reason.len());
        value.extend_from_slice(&[0, 0]);
        value.push((self.code.0 / ERROR_CODE_MODULO) as u8); // hundreds digit
        value.push((self.code.0 % ERROR_CODE_MODULO) as u8);
        value.extend_from_slice(reason);

        m.add(ATTR_ERROR_CODE, &value);
        Ok(())
    }
}

impl Getter for ErrorCodeAttribute {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_ERROR_CODE)?;
        if v.len() < ERROR_CODE_REASON_START {
            return Err(Error::ErrUnexpectedEof);
        }

        let class = v[ERROR_CODE_CLASS_BYTE] as u16;
        let number = v[ERROR_CODE_NUMBER_BYTE] as u16;
        self.code = ErrorCode(class * ERROR_CODE_MODULO + number);
        self.reason = String::from_utf8(v[ERROR_CODE_REASON_START..].to_vec())?;
        Ok(())
    }
}

/// Numeric code carried in ERROR-CODE.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Default, Debug)]
pub struct ErrorCode(pub u16);

impl Setter for ErrorCode {
    /// Adds ERROR-CODE with its registered default reason, or fails
    /// with ErrNoDefaultReason.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        if let Some(reason) = ERROR_REASONS.get(self) {
            ErrorCodeAttribute {
                code: *self,
                reason: (*reason).to_owned(),
            }
            .add_to(m)
        } else {
            Err(Error::ErrNoDefaultReason)
        }
    }
}

// RFC 5389.
pub const CODE_TRY_ALTERNATE: ErrorCode = ErrorCode(300);
pub const CODE_BAD_REQUEST: ErrorCode = ErrorCode(400);
pub const CODE_UNAUTHORIZED: ErrorCode = ErrorCode(401);
pub const CODE_UNKNOWN_ATTRIBUTE: ErrorCode = ErrorCode(420);
pub const CODE_STALE_NONCE: ErrorCode = ErrorCode(438);
pub const CODE_ROLE_CONFLICT: ErrorCode = ErrorCode(487);
pub const CODE_SERVER_ERROR: ErrorCode = ErrorCode(500);

// RFC 5766 Section 15.
pub const CODE_FORBIDDEN: ErrorCode = ErrorCode(403);
pub const CODE_ALLOC_MISMATCH: ErrorCode = ErrorCode(437);
pub const CODE_WRONG_CREDENTIALS: ErrorCode = ErrorCode(441);
pub const CODE_UNSUPPORTED_TRANS_PROTO: ErrorCode = ErrorCode(442);
pub const CODE_ALLOC_QUOTA_REACHED: ErrorCode = ErrorCode(486);
pub const CODE_INSUFFICIENT_CAPACITY: ErrorCode = ErrorCode(508);

// Pre-standard servers report capacity exhaustion with 436.
pub const CODE_LEGACY_INSUFFICIENT_CAPACITY: ErrorCode = ErrorCode(436);

lazy_static::lazy_static! {
    static ref ERROR_REASONS: HashMap<ErrorCode, &'static str> = [
        (CODE_TRY_ALTERNATE, "Try Alternate"),
        (CODE_BAD_REQUEST, "Bad Request"),
        (CODE_UNAUTHORIZED, "Unauthorized"),
        (CODE_UNKNOWN_ATTRIBUTE, "Unknown Attribute"),
        (CODE_STALE_NONCE, "Stale Nonce"),
        (CODE_ROLE_CONFLICT, "Role Conflict"),
        (CODE_SERVER_ERROR, "Server Error"),
        (CODE_FORBIDDEN, "Forbidden"),
        (CODE_ALLOC_MISMATCH, "Allocation Mismatch"),
        (CODE_WRONG_CREDENTIALS, "Wrong Credentials"),
        (CODE_UNSUPPORTED_TRANS_PROTO, "Unsupported Transport Protocol"),
        (CODE_ALLOC_QUOTA_REACHED, "Allocation Quota Reached"),
        (CODE_INSUFFICIENT_CAPACITY, "Insufficient Capacity"),
        (CODE_LEGACY_INSUFFICIENT_CAPACITY, "Insufficient Capacity"),
    ]
    .iter()
    .cloned()
    .collect();
}

impl ErrorCode {
    /// True for either spelling of the TURN capacity-exhaustion code.
    pub fn is_insufficient_capacity(&self) -> bool {
        *self == CODE_INSUFFICIENT_CAPACITY || *self == CODE_LEGACY_INSUFFICIENT_CAPACITY
    }
}
