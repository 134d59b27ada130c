//! Emulated block device.
//!
//! The device is a regular file of exactly `NBLOCKS * BSIZE` bytes,
//! addressed in whole blocks. Everything above this module does its I/O
//! through `read_blocks`/`write_blocks` exclusively.
//!
//! Interface:
//! * `create` formats a fresh device file (the old image, if any, is gone).
//! * `open` attaches to an existing device file and checks its size.
//! * `read_blocks`/`write_blocks` transfer a whole number of blocks
//!   between the device and a caller buffer.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::info;
use zerocopy::LayoutVerified;

use crate::error::{Result, SfsError};
use crate::param::{BSIZE, NBLOCKS};

/// One block worth of bytes.
///
/// Kept 8-aligned so a block can be reinterpreted as a packed array of
/// wider integers (the indirect block is read this way).
#[repr(C, align(8))]
pub struct Block(pub [u8; BSIZE]);

impl Block {
    pub const fn zeroed() -> Self {
        Block([0; BSIZE])
    }

    /// View the block as little-endian-native `u32` slots.
    pub fn as_u32s(&self) -> &[u32] {
        LayoutVerified::<&[u8], [u32]>::new_slice(&self.0[..])
            .expect("Block: 8-aligned, BSIZE % 4 == 0")
            .into_slice()
    }

    pub fn as_u32s_mut(&mut self) -> &mut [u32] {
        LayoutVerified::<&mut [u8], [u32]>::new_slice(&mut self.0[..])
            .expect("Block: 8-aligned, BSIZE % 4 == 0")
            .into_mut_slice()
    }
}

/// Handle to the backing device file.
pub struct Disk {
    file: File,
}

impl Disk {
    /// Create or truncate the device file and size it to the full volume.
    pub fn create(path: &Path) -> Result<Disk> {
        info!("disk: creating fresh device at {}", path.display());
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((NBLOCKS * BSIZE) as u64)?;
        Ok(Disk { file })
    }

    /// Attach to an existing device file.
    pub fn open(path: &Path) -> Result<Disk> {
        info!("disk: opening device at {}", path.display());
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        if file.metadata()?.len() != (NBLOCKS * BSIZE) as u64 {
            return Err(SfsError::Corrupt("device file has the wrong size"));
        }
        Ok(Disk { file })
    }

    /// Read `buf.len() / BSIZE` blocks starting at block `start`.
    pub fn read_blocks(&mut self, start: usize, buf: &mut [u8]) -> Result<()> {
        self.check_range(start, buf.len());
        self.file.seek(SeekFrom::Start((start * BSIZE) as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write `buf.len() / BSIZE` blocks starting at block `start`.
    pub fn write_blocks(&mut self, start: usize, buf: &[u8]) -> Result<()> {
        self.check_range(start, buf.len());
        self.file.seek(SeekFrom::Start((start * BSIZE) as u64))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    pub fn read_block(&mut self, bno: usize, block: &mut Block) -> Result<()> {
        self.read_blocks(bno, &mut block.0)
    }

    pub fn write_block(&mut self, bno: usize, block: &Block) -> Result<()> {
        self.write_blocks(bno, &block.0)
    }

    /// Every block id handed down here comes from validated metadata, so a
    /// transfer outside the device is corruption, not an I/O error.
    fn check_range(&self, start: usize, len: usize) {
        assert!(len % BSIZE == 0, "disk: partial-block transfer");
        assert!(
            start * BSIZE + len <= NBLOCKS * BSIZE,
            "disk: transfer past end of device (block {})",
            start
        );
    }
}
