//! Volume geometry.
//!
//! Every constant here is baked into the on-disk format; changing one
//! makes existing volume images unreadable.

use core::mem;

/// Block size in bytes.
pub const BSIZE: usize = 1024;

/// Device capacity in blocks (~100 MB).
pub const NBLOCKS: usize = 100_000;

/// Maximum number of inodes, the root included.
pub const NINODES: usize = 50;

/// Maximum file name length in bytes, excluding the terminator.
pub const MAXNAME: usize = 20;

/// Direct block pointers per inode.
pub const NDIRECT: usize = 12;

/// Block pointers held by the single indirect block.
pub const NINDIRECT: usize = BSIZE / mem::size_of::<u32>();

/// Maximum file length in blocks.
pub const MAXFILE: usize = NDIRECT + NINDIRECT;

/// Maximum file length in bytes.
pub const MAXFILESIZE: usize = MAXFILE * BSIZE;

/// Directory capacity; the root itself has no entry.
pub const NDENTRIES: usize = NINODES - 1;

/// Inode number of the root directory.
pub const ROOTINO: usize = 0;

/// Sentinel for an unassigned block pointer slot.
pub const NOBLOCK: u32 = u32::MAX;

/// Superblock magic.
pub const FSMAGIC: u64 = 0xACBD_0005;
