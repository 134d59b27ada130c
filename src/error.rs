//! Error kinds surfaced by the volume API.

use std::io;

use thiserror::Error;

/// Everything that can go wrong short of metadata corruption.
///
/// Corruption detected on the read path (a block-pointer slot that
/// invariant-wise must be assigned but holds the sentinel) is a panic,
/// not an `SfsError`: it means a previous mutation left the volume
/// inconsistent and nothing sensible can be salvaged in-process.
#[derive(Error, Debug)]
pub enum SfsError {
    /// File name is empty, longer than the on-disk field, or contains NUL.
    #[error("invalid file name")]
    NameInvalid,

    /// A fixed table (inodes, directory, descriptors) or the block pool
    /// is exhausted.
    #[error("no free {0} left on the volume")]
    NoSpace(&'static str),

    /// The write cursor already sits at the maximum file size.
    #[error("file is at its maximum size")]
    FileTooLarge,

    /// No directory entry carries the requested name.
    #[error("file not found")]
    NotFound,

    /// The handle does not name an open file.
    #[error("bad file handle")]
    BadHandle,

    /// Seek target lies outside `[0, MAXFILESIZE]`.
    #[error("seek position out of range")]
    BadRange,

    /// The device does not hold a volume this crate can mount.
    #[error("not a valid volume: {0}")]
    Corrupt(&'static str),

    /// Device I/O failure, propagated from the block layer.
    #[error("device i/o failed: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SfsError>;
