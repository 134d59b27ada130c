//! Root directory entries.
//!
//! The directory is a flat table of `NDENTRIES` fixed-size entries mapping
//! a name to an inode number. The name is stored as a NUL-terminated field
//! of `MAXNAME + 1` bytes so the table serialises as one contiguous array.

use core::mem;

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes};

use crate::error::Result;
use crate::name::FileName;
use crate::param::{MAXNAME, NDENTRIES};

/// One `name -> inode` mapping.
#[repr(C, packed)]
#[derive(Clone, Copy, AsBytes, FromBytes)]
pub struct DirEnt {
    /// Non-zero while the entry is live.
    pub used: u64,
    /// Inode described by this entry.
    pub inum: u64,
    name: [u8; MAXNAME + 1],
}

pub const DIRENT_SIZE: usize = mem::size_of::<DirEnt>();

assert_eq_size!(DirEnt, [u8; 37]);

impl DirEnt {
    pub const fn empty() -> DirEnt {
        DirEnt {
            used: 0,
            inum: 0,
            name: [0; MAXNAME + 1],
        }
    }

    pub fn new(name: &FileName, inum: usize) -> DirEnt {
        DirEnt {
            used: 1,
            inum: inum as u64,
            name: name.to_disk(),
        }
    }

    pub fn is_used(&self) -> bool {
        self.used != 0
    }

    /// Byte-compare against a validated name without decoding the field.
    pub fn name_matches(&self, name: &FileName) -> bool {
        let bytes = name.as_bytes();
        &self.name[..bytes.len()] == bytes && self.name[bytes.len()] == 0
    }

    /// Decode the stored name. Fails only on a corrupt table.
    pub fn file_name(&self) -> Result<FileName> {
        FileName::from_disk(&self.name)
    }
}

/// Serialise the whole table into its disk image. `buf` covers the full
/// directory extent and any tail padding is left zeroed.
pub fn encode_table(table: &[DirEnt; NDENTRIES], buf: &mut [u8]) {
    for (i, ent) in table.iter().enumerate() {
        buf[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE].copy_from_slice(ent.as_bytes());
    }
}

/// Parse the directory extent read back from disk.
pub fn decode_table(buf: &[u8]) -> [DirEnt; NDENTRIES] {
    let mut table = [DirEnt::empty(); NDENTRIES];
    for (i, ent) in table.iter_mut().enumerate() {
        ent.as_bytes_mut()
            .copy_from_slice(&buf[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_round_trip() {
        let name = FileName::new("notes").unwrap();
        let ent = DirEnt::new(&name, 7);
        assert!(ent.is_used());
        assert_eq!(ent.inum as usize, 7);
        assert!(ent.name_matches(&name));
        assert_eq!(ent.file_name().unwrap(), name);
    }

    #[test]
    fn matching_is_exact() {
        let ent = DirEnt::new(&FileName::new("log").unwrap(), 1);
        assert!(!ent.name_matches(&FileName::new("lo").unwrap()));
        assert!(!ent.name_matches(&FileName::new("logs").unwrap()));
    }

    #[test]
    fn table_round_trip() {
        let mut table = [DirEnt::empty(); NDENTRIES];
        table[0] = DirEnt::new(&FileName::new("a").unwrap(), 1);
        table[48] = DirEnt::new(&FileName::new(&"z".repeat(MAXNAME)).unwrap(), 49);

        let mut buf = vec![0u8; NDENTRIES * DIRENT_SIZE];
        encode_table(&table, &mut buf);
        let back = decode_table(&buf);

        assert!(back[0].name_matches(&FileName::new("a").unwrap()));
        assert!(!back[1].is_used());
        assert_eq!(back[48].inum as usize, 49);
    }
}
