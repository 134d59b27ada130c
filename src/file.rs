//! Open-file bookkeeping.
//!
//! A handle is an index into a fixed table of slots, each pairing an inode
//! number with a read/write cursor. The table never reaches the disk; it
//! belongs to the process, not the volume.

use crate::error::{Result, SfsError};
use crate::param::NINODES;

/// Handle to an open file.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Fd(pub(crate) usize);

#[derive(Clone, Copy)]
struct Slot {
    used: bool,
    inum: usize,
    rw_ptr: u64,
}

pub struct FileTable {
    slots: [Slot; NINODES],
}

impl FileTable {
    pub fn new() -> FileTable {
        FileTable {
            slots: [Slot {
                used: false,
                inum: 0,
                rw_ptr: 0,
            }; NINODES],
        }
    }

    /// Claim the lowest unused slot, cursor at 0.
    pub fn open(&mut self, inum: usize) -> Result<Fd> {
        let idx = self
            .slots
            .iter()
            .position(|s| !s.used)
            .ok_or(SfsError::NoSpace("file descriptors"))?;
        self.slots[idx] = Slot {
            used: true,
            inum,
            rw_ptr: 0,
        };
        Ok(Fd(idx))
    }

    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.slot_mut(fd)?.used = false;
        Ok(())
    }

    /// The handle already open on `inum`, if any. Makes `open` idempotent
    /// per inode.
    pub fn find_open(&self, inum: usize) -> Option<Fd> {
        self.slots
            .iter()
            .position(|s| s.used && s.inum == inum)
            .map(Fd)
    }

    /// Inode number and cursor of an open handle.
    pub fn get(&self, fd: Fd) -> Result<(usize, u64)> {
        let slot = self.slot(fd)?;
        Ok((slot.inum, slot.rw_ptr))
    }

    pub fn set_cursor(&mut self, fd: Fd, pos: u64) -> Result<()> {
        self.slot_mut(fd)?.rw_ptr = pos;
        Ok(())
    }

    /// Drop every handle on `inum`. Called when the file is removed so no
    /// handle dangles into a dead inode.
    pub fn invalidate(&mut self, inum: usize) {
        for slot in self.slots.iter_mut() {
            if slot.used && slot.inum == inum {
                slot.used = false;
            }
        }
    }

    fn slot(&self, fd: Fd) -> Result<&Slot> {
        match self.slots.get(fd.0) {
            Some(slot) if slot.used => Ok(slot),
            _ => Err(SfsError::BadHandle),
        }
    }

    fn slot_mut(&mut self, fd: Fd) -> Result<&mut Slot> {
        match self.slots.get_mut(fd.0) {
            Some(slot) if slot.used => Ok(slot),
            _ => Err(SfsError::BadHandle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_uses_lowest_slot() {
        let mut table = FileTable::new();
        assert_eq!(table.open(3).unwrap(), Fd(0));
        assert_eq!(table.open(4).unwrap(), Fd(1));
        table.close(Fd(0)).unwrap();
        assert_eq!(table.open(5).unwrap(), Fd(0));
    }

    #[test]
    fn close_then_use_is_bad_handle() {
        let mut table = FileTable::new();
        let fd = table.open(1).unwrap();
        table.close(fd).unwrap();
        assert!(matches!(table.get(fd), Err(SfsError::BadHandle)));
        assert!(matches!(table.close(fd), Err(SfsError::BadHandle)));
    }

    #[test]
    fn find_open_ignores_closed_slots() {
        let mut table = FileTable::new();
        let fd = table.open(9).unwrap();
        assert_eq!(table.find_open(9), Some(fd));
        table.close(fd).unwrap();
        assert_eq!(table.find_open(9), None);
    }

    #[test]
    fn invalidate_closes_every_handle_on_the_inode() {
        let mut table = FileTable::new();
        let fd = table.open(2).unwrap();
        table.invalidate(2);
        assert!(matches!(table.get(fd), Err(SfsError::BadHandle)));
    }

    #[test]
    fn table_exhaustion() {
        let mut table = FileTable::new();
        for i in 0..NINODES {
            table.open(i).unwrap();
        }
        assert!(matches!(
            table.open(0),
            Err(SfsError::NoSpace("file descriptors"))
        ));
    }
}
