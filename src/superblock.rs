//! Superblock and the fixed block map.
//!
//! Disk layout, decided once at format time:
//!
//! [ superblock | inode table | root directory | data pool ... | free bitmap ]
//!
//! Block 0 holds the superblock. The inode table and the root directory
//! table follow immediately; the free bitmap sits in the trailing blocks of
//! the device. Everything in between is the data pool, allocated on demand.

use core::mem;

use static_assertions::{assert_eq_size, const_assert};
use zerocopy::{AsBytes, FromBytes};

use crate::bitmap::BITMAP_BYTES;
use crate::dir::DIRENT_SIZE;
use crate::disk::Block;
use crate::error::{Result, SfsError};
use crate::inode::DINODE_SIZE;
use crate::param::{BSIZE, FSMAGIC, NBLOCKS, NDENTRIES, NDIRECT, NINODES, ROOTINO};

const fn blocks_for(bytes: usize) -> usize {
    (bytes + BSIZE - 1) / BSIZE
}

/// First block of the inode table.
pub const INODE_START: usize = 1;
/// Blocks occupied by the inode table.
pub const INODE_BLOCKS: usize = blocks_for(NINODES * DINODE_SIZE);
/// First block of the root directory table.
pub const DIR_START: usize = INODE_START + INODE_BLOCKS;
/// Blocks occupied by the root directory table.
pub const DIR_BLOCKS: usize = blocks_for(NDENTRIES * DIRENT_SIZE);
/// First block of the on-demand data pool.
pub const DATA_START: usize = DIR_START + DIR_BLOCKS;
/// Blocks occupied by the persisted free bitmap.
pub const BITMAP_BLOCKS: usize = blocks_for(BITMAP_BYTES);
/// First block of the persisted free bitmap.
pub const BITMAP_START: usize = NBLOCKS - BITMAP_BLOCKS;

// The root inode's direct slots must be able to hold the directory table.
const_assert!(DIR_BLOCKS <= NDIRECT);
const_assert!(DATA_START < BITMAP_START);

/// File-system-wide parameters, immutable after format.
#[repr(C)]
#[derive(Clone, Copy, Debug, AsBytes, FromBytes)]
pub struct Superblock {
    /// Must be `FSMAGIC`.
    pub magic: u64,
    /// Block size in bytes.
    pub block_size: u64,
    /// Size of the volume image in bytes.
    pub fs_size: u64,
    /// Length of the inode table in blocks.
    pub inode_table_len: u64,
    /// Inode number of the root directory.
    pub root_dir_inode: u64,
}

assert_eq_size!(Superblock, [u8; 40]);

impl Superblock {
    pub fn new() -> Superblock {
        Superblock {
            magic: FSMAGIC,
            block_size: BSIZE as u64,
            fs_size: (NBLOCKS * BSIZE) as u64,
            inode_table_len: INODE_BLOCKS as u64,
            root_dir_inode: ROOTINO as u64,
        }
    }

    /// Parse block 0 and reject anything this crate did not format.
    pub fn decode(block: &Block) -> Result<Superblock> {
        let mut sb = Superblock::new();
        sb.as_bytes_mut()
            .copy_from_slice(&block.0[..mem::size_of::<Superblock>()]);
        if sb.magic != FSMAGIC {
            return Err(SfsError::Corrupt("bad superblock magic"));
        }
        if sb.block_size != BSIZE as u64 || sb.fs_size != (NBLOCKS * BSIZE) as u64 {
            return Err(SfsError::Corrupt("unsupported volume geometry"));
        }
        if sb.inode_table_len != INODE_BLOCKS as u64 || sb.root_dir_inode != ROOTINO as u64 {
            return Err(SfsError::Corrupt("unsupported metadata layout"));
        }
        Ok(sb)
    }

    pub fn encode(&self, block: &mut Block) {
        block.0[..mem::size_of::<Superblock>()].copy_from_slice(self.as_bytes());
    }
}
