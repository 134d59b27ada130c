//! sfs: a single-volume, flat-directory file system on an emulated block
//! device.
//!
//! Four layers, leaves first:
//!   + Blocks: an emulated device backed by a regular file, plus the free
//!     bitmap that allocates from it.
//!   + Layout: byte-exact codecs for the superblock, inode table and root
//!     directory table.
//!   + Files: inode block addressing, the open-file table, and the
//!     read/write engines.
//!   + Volume: `Sfs`, which owns one mounted volume and exposes the whole
//!     API on `&mut self`.
//!
//! The volume is strictly single-threaded: every call runs to completion
//! and flushes the metadata it touched before returning, so the device
//! image always matches the in-memory caches at the API boundary.
//!
//! ```no_run
//! use sfs::Sfs;
//!
//! # fn main() -> sfs::Result<()> {
//! let mut fs = Sfs::format(std::path::Path::new("sfs_disk.disk"))?;
//! let fd = fs.open("hello.txt")?;
//! fs.write(fd, b"hello, disk")?;
//! fs.seek(fd, 0)?;
//! let mut buf = [0u8; 11];
//! fs.read(fd, &mut buf)?;
//! assert_eq!(&buf, b"hello, disk");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod bitmap;
mod dir;
mod disk;
mod error;
mod file;
mod fs;
mod inode;
mod name;
pub mod param;
mod superblock;

pub use crate::error::{Result, SfsError};
pub use crate::file::Fd;
pub use crate::fs::Sfs;
pub use crate::inode::FileMode;
pub use crate::name::FileName;
