//! The volume manager.
//!
//! `Sfs` owns one mounted volume end to end: the device handle, the cached
//! superblock, inode table, directory table and free bitmap, plus the
//! process-side file table and directory cursor. Every cache is
//! authoritative while the volume is open; each mutating call flushes the
//! metadata it touched back to the device before returning, so the on-disk
//! image matches the in-memory one at every API boundary.
//!
//! Reads and writes translate a byte range at the file cursor into block
//! I/O: a partial leading block, whole middle blocks, a partial trailing
//! block. Writes allocate missing blocks on the way through the bitmap and
//! grow the file size to the high-water mark of the cursor.

use std::path::Path;

use log::{debug, info, warn};

use crate::bitmap::{Bitmap, BITMAP_BYTES};
use crate::dir::{self, DirEnt};
use crate::disk::{Block, Disk};
use crate::error::{Result, SfsError};
use crate::file::{Fd, FileTable};
use crate::inode::{self, Dinode};
use crate::name::FileName;
use crate::param::{
    BSIZE, MAXFILE, MAXFILESIZE, NBLOCKS, NDENTRIES, NDIRECT, NINDIRECT, NINODES, NOBLOCK, ROOTINO,
};
use crate::superblock::{
    Superblock, BITMAP_BLOCKS, BITMAP_START, DIR_BLOCKS, DIR_START, INODE_BLOCKS, INODE_START,
};

/// A mounted volume.
pub struct Sfs {
    disk: Disk,
    sb: Superblock,
    inodes: [Dinode; NINODES],
    dir: [DirEnt; NDENTRIES],
    bitmap: Bitmap,
    files: FileTable,
    dir_cursor: usize,
}

impl Sfs {
    /// Create a fresh volume on `path`, clobbering whatever was there.
    ///
    /// Lays out the fixed metadata region, wires the directory table into
    /// the root inode's direct slots, reserves everything in the bitmap and
    /// writes the lot to the device.
    pub fn format(path: &Path) -> Result<Sfs> {
        info!("formatting volume at {}", path.display());
        let disk = Disk::create(path)?;

        let mut inodes = [Dinode::unused(); NINODES];
        let mut bitmap = Bitmap::all_free();

        let mut root = Dinode::new_file();
        bitmap.set(0);
        for b in INODE_START..INODE_START + INODE_BLOCKS {
            bitmap.set(b as u32);
        }
        for (i, b) in (DIR_START..DIR_START + DIR_BLOCKS).enumerate() {
            bitmap.set(b as u32);
            root.addr_direct[i] = b as u32;
        }
        for b in BITMAP_START..NBLOCKS {
            bitmap.set(b as u32);
        }
        inodes[ROOTINO] = root;

        let mut fs = Sfs {
            disk,
            sb: Superblock::new(),
            inodes,
            dir: [DirEnt::empty(); NDENTRIES],
            bitmap,
            files: FileTable::new(),
            dir_cursor: 0,
        };
        fs.flush_bitmap()?;
        fs.flush_superblock()?;
        fs.flush_inodes()?;
        fs.flush_dir()?;
        Ok(fs)
    }

    /// Mount the volume already present on `path`.
    pub fn mount(path: &Path) -> Result<Sfs> {
        info!("mounting volume at {}", path.display());
        let mut disk = Disk::open(path)?;

        let mut block = Block::zeroed();
        disk.read_block(0, &mut block)?;
        let sb = Superblock::decode(&block)?;

        let mut buf = vec![0u8; INODE_BLOCKS * BSIZE];
        disk.read_blocks(INODE_START, &mut buf)?;
        let inodes = inode::decode_table(&buf);

        let mut buf = vec![0u8; DIR_BLOCKS * BSIZE];
        disk.read_blocks(DIR_START, &mut buf)?;
        let dir = dir::decode_table(&buf);

        let mut buf = vec![0u8; BITMAP_BLOCKS * BSIZE];
        disk.read_blocks(BITMAP_START, &mut buf)?;
        let bitmap = Bitmap::from_bytes(&buf);

        let fs = Sfs {
            disk,
            sb,
            inodes,
            dir,
            bitmap,
            files: FileTable::new(),
            dir_cursor: 0,
        };
        fs.check_tables()?;
        Ok(fs)
    }

    /// Open `name`, creating an empty file if it does not exist yet.
    ///
    /// Opening a file that is already open returns the existing handle;
    /// otherwise the handle starts with its cursor at 0.
    pub fn open(&mut self, name: &str) -> Result<Fd> {
        let name = FileName::new(name)?;
        let inum = match self.lookup(&name) {
            Some((_, inum)) => inum,
            None => self.create(&name)?,
        };
        if let Some(fd) = self.files.find_open(inum) {
            return Ok(fd);
        }
        self.files.open(inum)
    }

    /// Release an open handle.
    pub fn close(&mut self, fd: Fd) -> Result<()> {
        self.files.close(fd)
    }

    /// Move the cursor of an open handle.
    ///
    /// Any position up to the maximum file size is accepted, including past
    /// the current end: reads there see nothing, writes grow the file.
    pub fn seek(&mut self, fd: Fd, pos: u64) -> Result<()> {
        self.files.get(fd)?;
        if pos > MAXFILESIZE as u64 {
            warn!("seek: position {} outside the file-size limit", pos);
            return Err(SfsError::BadRange);
        }
        self.files.set_cursor(fd, pos)
    }

    /// Read from the cursor into `buf`. Returns the byte count, which falls
    /// short of `buf.len()` at end of file.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let (inum, rw_ptr) = self.files.get(fd)?;
        let ino = self.inodes[inum];
        let size = ino.size as usize;
        let mut off = rw_ptr as usize;
        if off >= size || buf.is_empty() {
            return Ok(0);
        }
        let n = buf.len().min(size - off);

        let mut tot = 0;
        let mut block = Block::zeroed();
        while tot < n {
            let bno = self.block_of(&ino, off / BSIZE)?;
            self.disk.read_block(bno as usize, &mut block)?;
            let m = (n - tot).min(BSIZE - off % BSIZE);
            let begin = off % BSIZE;
            buf[tot..tot + m].copy_from_slice(&block.0[begin..begin + m]);
            tot += m;
            off += m;
        }
        self.files.set_cursor(fd, off as u64)?;
        Ok(tot)
    }

    /// Write `buf` at the cursor. Returns the byte count, which falls short
    /// of `buf.len()` when the file hits its maximum size or the block pool
    /// runs dry mid-write; in both cases the bytes already placed stay.
    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize> {
        let (inum, rw_ptr) = self.files.get(fd)?;
        if buf.is_empty() {
            return Ok(0);
        }
        let start = rw_ptr as usize;

        let res = self.write_inner(inum, start, buf);
        // Metadata write-through happens even after a partial failure so
        // the on-disk tables track whatever allocation did succeed.
        self.flush_inodes()?;
        self.flush_bitmap()?;

        let tot = res?;
        self.files.set_cursor(fd, (start + tot) as u64)?;
        Ok(tot)
    }

    /// Drop `name`: give its blocks back to the bitmap (the indirect block
    /// included), clear the inode and directory entry, and close any handle
    /// still open on it.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let name = FileName::new(name)?;
        let (slot, inum) = match self.lookup(&name) {
            Some(found) => found,
            None => {
                warn!("remove: no file named {}", name);
                return Err(SfsError::NotFound);
            }
        };

        let ino = self.inodes[inum];
        for &addr in ino.addr_direct.iter() {
            if addr != NOBLOCK {
                self.bitmap.free(addr);
            }
        }
        if ino.addr_indirect != NOBLOCK {
            let mut block = Block::zeroed();
            self.disk.read_block(ino.addr_indirect as usize, &mut block)?;
            for &addr in block.as_u32s().iter() {
                if addr != NOBLOCK {
                    self.bitmap.free(addr);
                }
            }
            self.bitmap.free(ino.addr_indirect);
        }

        self.inodes[inum] = Dinode::unused();
        self.dir[slot] = DirEnt::empty();
        self.files.invalidate(inum);

        self.flush_bitmap()?;
        self.flush_inodes()?;
        self.flush_dir()?;
        debug!("remove: {} freed inode {}", name, inum);
        Ok(())
    }

    /// Byte size of the file carrying `name`.
    pub fn file_size(&self, name: &str) -> Result<u64> {
        let name = FileName::new(name)?;
        let (_, inum) = self.lookup(&name).ok_or(SfsError::NotFound)?;
        Ok(self.inodes[inum].size as u64)
    }

    /// Step the volume-wide directory cursor.
    ///
    /// Yields each used entry once per sweep, paired with the number of
    /// used entries after it in table order. `None` marks the end of the
    /// sweep and rewinds the cursor for the next one.
    pub fn next_file_name(&mut self) -> Option<(FileName, usize)> {
        while self.dir_cursor < NDENTRIES {
            let slot = self.dir_cursor;
            self.dir_cursor += 1;
            let ent = &self.dir[slot];
            if !ent.is_used() {
                continue;
            }
            let name = match ent.file_name() {
                Ok(name) => name,
                Err(_) => panic!("directory entry {} corrupt", slot),
            };
            let remaining = self.dir[slot + 1..].iter().filter(|e| e.is_used()).count();
            return Some((name, remaining));
        }
        self.dir_cursor = 0;
        None
    }

    fn lookup(&self, name: &FileName) -> Option<(usize, usize)> {
        self.dir.iter().enumerate().find_map(|(slot, ent)| {
            if ent.is_used() && ent.name_matches(name) {
                Some((slot, ent.inum as usize))
            } else {
                None
            }
        })
    }

    fn create(&mut self, name: &FileName) -> Result<usize> {
        let inum = self
            .inodes
            .iter()
            .position(|i| !i.is_used())
            .ok_or(SfsError::NoSpace("inodes"))?;
        let slot = self
            .dir
            .iter()
            .position(|e| !e.is_used())
            .ok_or(SfsError::NoSpace("directory entries"))?;

        self.inodes[inum] = Dinode::new_file();
        self.dir[slot] = DirEnt::new(name, inum);
        self.flush_inodes()?;
        self.flush_dir()?;
        debug!("create: {} at inode {}", name, inum);
        Ok(inum)
    }

    /// Device block backing file block `bn` of `ino`.
    ///
    /// Read-path resolution: by the size invariant every block under the
    /// file's end is assigned, so a sentinel here means the block map is
    /// corrupt and there is nothing sensible left to do.
    fn block_of(&mut self, ino: &Dinode, bn: usize) -> Result<u32> {
        let addr = if bn < NDIRECT {
            ino.addr_direct[bn]
        } else {
            assert!(bn < MAXFILE, "file block {} out of range", bn);
            let ind = ino.addr_indirect;
            assert_ne!(ind, NOBLOCK, "block map corrupt: no indirect block");
            let mut block = Block::zeroed();
            self.disk.read_block(ind as usize, &mut block)?;
            block.as_u32s()[bn - NDIRECT]
        };
        assert_ne!(addr, NOBLOCK, "block map corrupt: unassigned block {}", bn);
        Ok(addr)
    }

    /// Resolve file block `bn`, allocating it (and the indirect block, if
    /// that is what it takes) when unassigned. A mutated indirect block is
    /// written straight through. Returns the device block and whether it is
    /// freshly allocated, in which case its on-device bytes are stale.
    fn map_or_alloc(&mut self, inum: usize, bn: usize) -> Result<(u32, bool)> {
        if bn < NDIRECT {
            let addr = self.inodes[inum].addr_direct[bn];
            if addr != NOBLOCK {
                return Ok((addr, false));
            }
            let fresh = self.balloc()?;
            self.inodes[inum].addr_direct[bn] = fresh;
            debug!("inode {}: direct slot {} -> block {}", inum, bn, fresh);
            return Ok((fresh, true));
        }

        let slot = bn - NDIRECT;
        assert!(slot < NINDIRECT, "file block {} out of range", bn);

        let mut block = Block::zeroed();
        let ind = self.inodes[inum].addr_indirect;
        let ind = if ind == NOBLOCK {
            let ind = self.balloc()?;
            block.as_u32s_mut().fill(NOBLOCK);
            self.disk.write_block(ind as usize, &block)?;
            self.inodes[inum].addr_indirect = ind;
            debug!("inode {}: indirect block at {}", inum, ind);
            ind
        } else {
            self.disk.read_block(ind as usize, &mut block)?;
            ind
        };

        let addr = block.as_u32s()[slot];
        if addr != NOBLOCK {
            return Ok((addr, false));
        }
        let fresh = self.balloc()?;
        block.as_u32s_mut()[slot] = fresh;
        self.disk.write_block(ind as usize, &block)?;
        debug!("inode {}: indirect slot {} -> block {}", inum, slot, fresh);
        Ok((fresh, true))
    }

    fn balloc(&mut self) -> Result<u32> {
        self.bitmap.alloc().ok_or(SfsError::NoSpace("blocks"))
    }

    fn write_inner(&mut self, inum: usize, start: usize, buf: &[u8]) -> Result<usize> {
        if start > self.inodes[inum].size as usize {
            self.extend_with_zeros(inum, start)?;
        }

        let n = buf.len();
        let mut tot = 0;
        let mut off = start;
        let mut block = Block::zeroed();
        while tot < n {
            if off == MAXFILESIZE {
                if tot == 0 {
                    return Err(SfsError::FileTooLarge);
                }
                debug!("write: hit the file-size limit after {} bytes", tot);
                break;
            }
            let (bno, fresh) = match self.map_or_alloc(inum, off / BSIZE) {
                Ok(mapped) => mapped,
                Err(SfsError::NoSpace(what)) if tot > 0 => {
                    debug!("write: out of {} after {} bytes", what, tot);
                    break;
                }
                Err(e) => return Err(e),
            };
            let m = (n - tot).min(BSIZE - off % BSIZE);
            let begin = off % BSIZE;
            if m < BSIZE {
                // Partial block: keep the bytes around the write. A fresh
                // block has no bytes worth keeping, it just becomes zeroes.
                if fresh {
                    block.0.fill(0);
                } else {
                    self.disk.read_block(bno as usize, &mut block)?;
                }
            }
            block.0[begin..begin + m].copy_from_slice(&buf[tot..tot + m]);
            self.disk.write_block(bno as usize, &block)?;
            tot += m;
            off += m;
        }

        if off > self.inodes[inum].size as usize {
            self.inodes[inum].size = off as u32;
        }
        Ok(tot)
    }

    /// Grow a file whose cursor was seeked past its end by physically
    /// zeroing the gap, so every block under the new end is assigned and
    /// readable. The size is bumped one block at a time, keeping it in step
    /// with what is actually allocated should allocation fail midway.
    fn extend_with_zeros(&mut self, inum: usize, target: usize) -> Result<()> {
        debug_assert!(target <= MAXFILESIZE);
        let mut size = self.inodes[inum].size as usize;

        // Stale bytes in the tail of the current last block would become
        // readable once the size moves past them; zero them now.
        if size % BSIZE != 0 {
            let ino = self.inodes[inum];
            let bno = self.block_of(&ino, size / BSIZE)?;
            let mut block = Block::zeroed();
            self.disk.read_block(bno as usize, &mut block)?;
            block.0[size % BSIZE..].fill(0);
            self.disk.write_block(bno as usize, &block)?;
            size = target.min((size / BSIZE + 1) * BSIZE);
            self.inodes[inum].size = size as u32;
        }

        let zero = Block::zeroed();
        while size < target {
            let (bno, _) = self.map_or_alloc(inum, size / BSIZE)?;
            self.disk.write_block(bno as usize, &zero)?;
            size = target.min(size + BSIZE);
            self.inodes[inum].size = size as u32;
        }
        Ok(())
    }

    /// Cross-check the loaded tables before trusting them: invariants that
    /// every mutation preserves must already hold in the image.
    fn check_tables(&self) -> Result<()> {
        if !self.inodes[ROOTINO].is_used() {
            return Err(SfsError::Corrupt("root inode unused"));
        }
        let mut names: Vec<FileName> = Vec::with_capacity(NDENTRIES);
        for ent in self.dir.iter().filter(|e| e.is_used()) {
            let inum = ent.inum as usize;
            if inum >= NINODES || !self.inodes[inum].is_used() {
                return Err(SfsError::Corrupt("directory entry names a dead inode"));
            }
            let name = ent.file_name()?;
            if names.contains(&name) {
                return Err(SfsError::Corrupt("duplicate file name"));
            }
            names.push(name);
        }
        Ok(())
    }

    fn flush_superblock(&mut self) -> Result<()> {
        let mut block = Block::zeroed();
        self.sb.encode(&mut block);
        self.disk.write_block(0, &block)
    }

    fn flush_inodes(&mut self) -> Result<()> {
        let mut buf = [0u8; INODE_BLOCKS * BSIZE];
        inode::encode_table(&self.inodes, &mut buf);
        self.disk.write_blocks(INODE_START, &buf)
    }

    fn flush_dir(&mut self) -> Result<()> {
        let mut buf = [0u8; DIR_BLOCKS * BSIZE];
        dir::encode_table(&self.dir, &mut buf);
        self.disk.write_blocks(DIR_START, &buf)
    }

    fn flush_bitmap(&mut self) -> Result<()> {
        let mut buf = [0u8; BITMAP_BLOCKS * BSIZE];
        buf[..BITMAP_BYTES].copy_from_slice(self.bitmap.as_bytes());
        self.disk.write_blocks(BITMAP_START, &buf)
    }
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    use super::*;
    use crate::superblock::DATA_START;

    struct TempPath(PathBuf);

    impl TempPath {
        fn new() -> Self {
            let path = env::temp_dir().join(format!(
                "sfs-fs-test-{}-{:08x}",
                std::process::id(),
                rand::random::<u32>()
            ));
            TempPath(path)
        }
    }

    impl Drop for TempPath {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn format_reserves_the_metadata_region() {
        let tmp = TempPath::new();
        let fs = Sfs::format(&tmp.0).unwrap();

        assert!(!fs.bitmap.is_free(0));
        for b in INODE_START..DATA_START {
            assert!(!fs.bitmap.is_free(b as u32));
        }
        assert!(fs.bitmap.is_free(DATA_START as u32));
        for b in BITMAP_START..NBLOCKS {
            assert!(!fs.bitmap.is_free(b as u32));
        }

        let root = &fs.inodes[ROOTINO];
        assert!(root.is_used());
        assert_eq!(root.size, 0);
        assert_eq!(root.addr_direct[0] as usize, DIR_START);
        assert_eq!(root.addr_direct[DIR_BLOCKS], NOBLOCK);
    }

    #[test]
    fn first_data_block_is_allocated_lowest_first() {
        let tmp = TempPath::new();
        let mut fs = Sfs::format(&tmp.0).unwrap();
        let fd = fs.open("a").unwrap();
        fs.write(fd, b"x").unwrap();
        assert_eq!(fs.inodes[1].addr_direct[0] as usize, DATA_START);
    }

    #[test]
    fn create_rejects_the_fiftieth_file() {
        let tmp = TempPath::new();
        let mut fs = Sfs::format(&tmp.0).unwrap();
        for i in 0..NDENTRIES {
            let fd = fs.open(&format!("f{}", i)).unwrap();
            fs.close(fd).unwrap();
        }
        assert!(matches!(fs.open("straw"), Err(SfsError::NoSpace(_))));
    }

    #[test]
    fn extending_past_eof_zeroes_the_gap() {
        let tmp = TempPath::new();
        let mut fs = Sfs::format(&tmp.0).unwrap();
        let fd = fs.open("gap").unwrap();
        fs.write(fd, b"head").unwrap();
        fs.seek(fd, 2000).unwrap();
        fs.write(fd, b"tail").unwrap();
        assert_eq!(fs.file_size("gap").unwrap(), 2004);

        fs.seek(fd, 0).unwrap();
        let mut back = vec![0u8; 2004];
        assert_eq!(fs.read(fd, &mut back).unwrap(), 2004);
        assert_eq!(&back[..4], b"head");
        assert!(back[4..2000].iter().all(|&b| b == 0));
        assert_eq!(&back[2000..], b"tail");
    }

    #[test]
    fn mount_rejects_a_blank_device() {
        let tmp = TempPath::new();
        let _ = Disk::create(&tmp.0).unwrap();
        assert!(matches!(Sfs::mount(&tmp.0), Err(SfsError::Corrupt(_))));
    }
}
