//! Bounded file names.

use core::fmt;

use arrayvec::ArrayString;

use crate::error::{Result, SfsError};
use crate::param::MAXNAME;

/// A validated file name.
///
/// Invariant:
/// - 1 to `MAXNAME` bytes of UTF-8.
/// - Contains no NUL characters, so the on-disk form can be
///   NUL-terminated.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FileName {
    inner: ArrayString<MAXNAME>,
}

impl FileName {
    /// Validate a caller-supplied name.
    pub fn new(name: &str) -> Result<FileName> {
        if name.is_empty() || name.len() > MAXNAME || name.bytes().any(|b| b == 0) {
            return Err(SfsError::NameInvalid);
        }
        let inner = ArrayString::from(name).map_err(|_| SfsError::NameInvalid)?;
        Ok(FileName { inner })
    }

    pub fn as_str(&self) -> &str {
        self.inner.as_str()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Rebuild a name from its fixed NUL-terminated disk field.
    pub(crate) fn from_disk(field: &[u8; MAXNAME + 1]) -> Result<FileName> {
        let len = field
            .iter()
            .position(|&b| b == 0)
            .ok_or(SfsError::Corrupt("unterminated file name"))?;
        if len == 0 {
            return Err(SfsError::Corrupt("empty file name on disk"));
        }
        let name = core::str::from_utf8(&field[..len])
            .map_err(|_| SfsError::Corrupt("file name is not utf-8"))?;
        let inner = ArrayString::from(name).map_err(|_| SfsError::Corrupt("file name too long"))?;
        Ok(FileName { inner })
    }

    /// The fixed NUL-terminated disk field.
    pub(crate) fn to_disk(&self) -> [u8; MAXNAME + 1] {
        let mut field = [0; MAXNAME + 1];
        field[..self.inner.len()].copy_from_slice(self.inner.as_bytes());
        field
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}
