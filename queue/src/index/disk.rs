//! An index persisted in a single file.
//!
//! # Format
//!
//! The file holds two fixed-size slots. Each commit writes the complete state, with a version
//! one greater than the last, into the slot that does not hold the latest state:
//!
//! ```text
//! +---------------+---------------+---------------+---------------+---------------+-----------+
//! | Version (u64) | Head Arena    | Head Offset   | Tail Arena    | Tail Offset   | CRC32     |
//! |               | (u64)         | (u64)         | (u64)         | (u64)         | (u32)     |
//! +---------------+---------------+---------------+---------------+---------------+-----------+
//! ```
//!
//! _All integers are big-endian. The CRC32 covers the preceding 40 bytes of the slot._
//!
//! On open, the valid slot with the highest version wins. A write torn by a crash therefore
//! only ever loses the commit being written, never the one before it.
//! If the very first commit was torn, no state was ever committed and the index opens empty.

use crate::{Error, Position};
use bytes::{Buf, BufMut};
use std::{
    fs::{self, File, OpenOptions},
    os::unix::fs::FileExt,
    path::Path,
};
use tracing::{debug, warn};

/// Size of a slot without its checksum.
const BODY_SIZE: usize = 5 * std::mem::size_of::<u64>();

/// Size of a slot.
const SLOT_SIZE: usize = BODY_SIZE + std::mem::size_of::<u32>();

/// Size of the index file.
const FILE_SIZE: usize = 2 * SLOT_SIZE;

/// File-backed [super::Index].
///
/// Every commit is synced to disk before it returns.
pub struct Index {
    file: File,
    version: u64,
    head: Position,
    tail: Position,
}

impl Index {
    /// Open the index stored at `path`, creating an empty one if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // A new file holds an empty queue
        let len = file.metadata()?.len();
        if len == 0 {
            let index = Self::create(file)?;
            debug!(path = %path.display(), "created index");
            return Ok(index);
        }
        if len != FILE_SIZE as u64 {
            return Err(Error::IndexCorrupt(format!(
                "unexpected length: expected={FILE_SIZE} found={len}"
            )));
        }

        // Pick the latest valid slot
        let mut buf = [0u8; FILE_SIZE];
        file.read_exact_at(&mut buf, 0)?;
        let (left, right) = buf.split_at(SLOT_SIZE);
        let latest = match (decode(left), decode(right)) {
            (Some(left), Some(right)) => Some(if left.0 > right.0 { left } else { right }),
            (Some(slot), None) | (None, Some(slot)) => Some(slot),
            (None, None) => None,
        };
        let Some((version, head, tail)) = latest else {
            // Both slots written and both damaged: committed state was lost
            if !blank(left) && !blank(right) {
                return Err(Error::IndexCorrupt("no valid slot".into()));
            }

            // The first commit never completed, so nothing was ever committed
            warn!(path = %path.display(), "first commit incomplete, resetting index");
            return Self::create(file);
        };
        debug!(path = %path.display(), version, %head, %tail, "loaded index");

        Ok(Self {
            file,
            version,
            head,
            tail,
        })
    }

    /// Commit an empty queue to a file holding no valid state.
    fn create(file: File) -> Result<Self, Error> {
        let mut index = Self {
            file,
            version: 0,
            head: Position::default(),
            tail: Position::default(),
        };
        index.commit(index.head, index.tail)?;
        Ok(index)
    }

    /// Write `head` and `tail` to the older slot and sync it.
    fn commit(&mut self, head: Position, tail: Position) -> Result<(), Error> {
        let version = self.version + 1;
        let slot = (version % 2) as usize;
        let buf = encode(version, head, tail);
        self.file.write_all_at(&buf, (slot * SLOT_SIZE) as u64)?;
        self.file.sync_data()?;

        self.version = version;
        self.head = head;
        self.tail = tail;
        Ok(())
    }
}

impl super::Index for Index {
    fn head(&self) -> Position {
        self.head
    }

    fn tail(&self) -> Position {
        self.tail
    }

    fn put_head(&mut self, head: Position) -> Result<(), Error> {
        self.commit(head, self.tail)
    }

    fn put_tail(&mut self, tail: Position) -> Result<(), Error> {
        self.commit(self.head, tail)
    }

    fn sync(&self) -> Result<(), Error> {
        self.file.sync_all()?;
        Ok(())
    }
}

fn encode(version: u64, head: Position, tail: Position) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SLOT_SIZE);
    buf.put_u64(version);
    buf.put_u64(head.arena);
    buf.put_u64(head.offset as u64);
    buf.put_u64(tail.arena);
    buf.put_u64(tail.offset as u64);
    let checksum = crc32fast::hash(&buf);
    buf.put_u32(checksum);
    buf
}

/// Whether a slot was never written.
fn blank(slot: &[u8]) -> bool {
    slot.iter().all(|b| *b == 0)
}

fn decode(slot: &[u8]) -> Option<(u64, Position, Position)> {
    if blank(slot) {
        return None;
    }

    let (mut body, mut checksum) = slot.split_at(BODY_SIZE);
    let stored = checksum.get_u32();
    let computed = crc32fast::hash(body);
    if stored != computed {
        warn!(stored, computed, "index slot checksum mismatch");
        return None;
    }

    let version = body.get_u64();
    let head = Position::new(body.get_u64(), usize::try_from(body.get_u64()).ok()?);
    let tail = Position::new(body.get_u64(), usize::try_from(body.get_u64()).ok()?);
    Some((version, head, tail))
}
