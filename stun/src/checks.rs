use subtle::ConstantTimeEq;

use crate::attributes::AttrType;
use crate::error::{Error, Result};

// check_size returns ErrAttributeSizeInvalid if got is not equal to expected.
pub(crate) fn check_size(_at: AttrType, got: usize, expected: usize) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::ErrAttributeSizeInvalid)
    }
}

// check_overflow returns ErrAttributeSizeOverflow if got is bigger than max.
pub(crate) fn check_overflow(_at: AttrType, got: usize, max: usize) -> Result<()> {
    if got <= max {
        Ok(())
    } else {
        Err(Error::ErrAttributeSizeOverflow)
    }
}

// check_hmac compares the received HMAC against the computed one in
// constant time.
pub(crate) fn check_hmac(got: &[u8], expected: &[u8]) -> Result<()> {
    if got.ct_eq(expected).into() {
        Ok(())
    } else {
        Err(Error::ErrIntegrityMismatch)
    }
}

pub(crate) fn check_fingerprint(got: u32, expected: u32) -> Result<()> {
    if got == expected {
        Ok(())
    } else {
        Err(Error::ErrFingerprintMismatch)
    }
}
