//! On-disk inodes.
//!
//! An inode describes a single unnamed file: advisory ownership bits, the
//! byte size, and the list of blocks holding the file's content. The first
//! `NDIRECT` block numbers are listed in `addr_direct`; the next
//! `NINDIRECT` live in the block named by `addr_indirect`, which is
//! allocated lazily when a file outgrows its direct slots.
//!
//! Unassigned slots hold `NOBLOCK` (all ones), never 0: block 0 is the
//! superblock and a valid, if nonsensical, pointer target.

use core::mem;

use bitflags::bitflags;
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes};

use crate::param::{NDIRECT, NINODES, NOBLOCK};

bitflags! {
    /// Advisory permission bits. Stored and reported, never enforced.
    pub struct FileMode: u32 {
        const USER_READ = 0o400;
        const USER_WRITE = 0o200;
        const USER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

/// On-disk inode structure.
#[repr(C)]
#[derive(Clone, Copy, AsBytes, FromBytes)]
pub struct Dinode {
    /// Non-zero while the slot describes a live file.
    pub used: u32,
    /// Advisory `FileMode` bits.
    pub mode: u32,
    /// Number of directory entries naming this inode. Always 1 here:
    /// links are not supported, the field exists for the layout.
    pub link_cnt: u32,
    pub uid: u32,
    pub gid: u32,
    /// File length in bytes.
    pub size: u32,
    /// Direct data block addresses.
    pub addr_direct: [u32; NDIRECT],
    /// Indirect data block address.
    pub addr_indirect: u32,
}

pub const DINODE_SIZE: usize = mem::size_of::<Dinode>();

assert_eq_size!(Dinode, [u8; 76]);

impl Dinode {
    /// An unoccupied table slot.
    pub const fn unused() -> Dinode {
        Dinode {
            used: 0,
            mode: 0,
            link_cnt: 0,
            uid: 0,
            gid: 0,
            size: 0,
            addr_direct: [NOBLOCK; NDIRECT],
            addr_indirect: NOBLOCK,
        }
    }

    /// A freshly created, empty file owned by root:root.
    pub fn new_file() -> Dinode {
        Dinode {
            used: 1,
            mode: FileMode::all().bits(),
            link_cnt: 1,
            uid: 0,
            gid: 0,
            size: 0,
            addr_direct: [NOBLOCK; NDIRECT],
            addr_indirect: NOBLOCK,
        }
    }

    pub fn is_used(&self) -> bool {
        self.used != 0
    }

    pub fn mode(&self) -> FileMode {
        FileMode::from_bits_truncate(self.mode)
    }
}

/// Serialise the whole table into its disk image. `buf` covers the full
/// inode-table extent and any tail padding is left zeroed.
pub fn encode_table(table: &[Dinode; NINODES], buf: &mut [u8]) {
    for (i, ino) in table.iter().enumerate() {
        buf[i * DINODE_SIZE..(i + 1) * DINODE_SIZE].copy_from_slice(ino.as_bytes());
    }
}

/// Parse the inode-table extent read back from disk.
pub fn decode_table(buf: &[u8]) -> [Dinode; NINODES] {
    let mut table = [Dinode::unused(); NINODES];
    for (i, ino) in table.iter_mut().enumerate() {
        ino.as_bytes_mut()
            .copy_from_slice(&buf[i * DINODE_SIZE..(i + 1) * DINODE_SIZE]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_file_starts_empty() {
        let ino = Dinode::new_file();
        assert!(ino.is_used());
        assert_eq!(ino.size, 0);
        assert_eq!(ino.mode(), FileMode::all());
        assert!(ino.addr_direct.iter().all(|&a| a == NOBLOCK));
        assert_eq!(ino.addr_indirect, NOBLOCK);
    }

    #[test]
    fn table_round_trip() {
        let mut table = [Dinode::unused(); NINODES];
        table[0] = Dinode::new_file();
        table[0].size = 13_312;
        table[0].addr_direct[3] = 99;
        table[7] = Dinode::new_file();

        let mut buf = vec![0u8; NINODES * DINODE_SIZE];
        encode_table(&table, &mut buf);
        let back = decode_table(&buf);

        assert_eq!(back[0].size, 13_312);
        assert_eq!(back[0].addr_direct[3], 99);
        assert!(back[7].is_used());
        assert!(!back[8].is_used());
    }
}
