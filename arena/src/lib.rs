//! Fixed-size, byte-addressable arenas that back a segmented queue.
//!
//! # Status
//!
//! `bigqueue-arena` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.
//!
//! An [Arena] is a zero-indexed run of bytes with a capacity fixed when it is opened. Reads and
//! writes are bounded by that capacity: a variable-length access that reaches the end of an arena
//! is truncated there and reports how many bytes it touched, it never spills into another arena.
//! Stitching consecutive arenas into one address space is the caller's job.
//!
//! A [Storage] opens arenas by numeric id and lists the ids it already holds.
//!
//! # Backends
//!
//! - [memory::Storage]: arenas held in memory, shared across clones (useful to simulate restarts).
//! - [mmap::Storage]: one memory-mapped file per arena in a directory.
//! - [metered::Storage]: wraps any backend and records read/write counts in a
//!   [prometheus_client] registry.
//!
//! # Encoding
//!
//! Fixed-width integers ([Arena::read_u64] and [Arena::write_u64]) are big-endian.

use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

pub mod memory;
pub mod metered;
pub mod mmap;

/// Size of a fixed-width integer stored in an arena.
pub const U64_SIZE: usize = std::mem::size_of::<u64>();

/// Errors that can occur when interacting with an arena.
#[derive(Debug, Error)]
pub enum Error {
    #[error("offset out of bounds: offset={offset} len={len} size={size}")]
    OffsetOutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("arena size mismatch: arena={id} expected={expected} found={found}")]
    SizeMismatch {
        id: u64,
        expected: usize,
        found: usize,
    },
    #[error("arena open failed: {0} error: {1}")]
    OpenFailed(u64, IoError),
    #[error("arena sync failed: {0} error: {1}")]
    SyncFailed(u64, IoError),
    #[error("directory corrupt: {0}")]
    DirectoryCorrupt(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] IoError),
}

/// A fixed-capacity byte array.
pub trait Arena {
    /// Capacity of the arena in bytes.
    fn size(&self) -> usize;

    /// Read the big-endian `u64` stored at `offset`.
    ///
    /// Fails unless `offset + 8 <= size`.
    fn read_u64(&self, offset: usize) -> Result<u64, Error>;

    /// Read up to `buf.len()` bytes starting at `offset`, stopping at the end of the arena.
    ///
    /// Returns the number of bytes copied into `buf`. Reading at `offset == size` returns 0.
    fn read(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error>;

    /// Write `value` as a big-endian `u64` at `offset`.
    ///
    /// Fails unless `offset + 8 <= size`.
    fn write_u64(&mut self, offset: usize, value: u64) -> Result<(), Error>;

    /// Write up to `buf.len()` bytes starting at `offset`, stopping at the end of the arena.
    ///
    /// Returns the number of bytes written.
    fn write(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error>;

    /// Ensure all written data is durably persisted.
    fn sync(&self) -> Result<(), Error>;
}

/// A collection of arenas addressed by id.
pub trait Storage {
    /// The arena type returned when opening an arena.
    type Arena: Arena;

    /// Open the arena with the given `id`, creating a zero-filled one of `size` bytes if it
    /// does not exist yet.
    ///
    /// Reopening an existing arena with a different `size` returns [Error::SizeMismatch].
    fn open(&self, id: u64, size: usize) -> Result<Self::Arena, Error>;

    /// Return the ids of all existing arenas in ascending order.
    fn scan(&self) -> Result<Vec<u64>, Error>;
}

/// Number of bytes a `len`-byte access at `offset` may touch in an arena of `size` bytes.
pub(crate) fn bounded(offset: usize, len: usize, size: usize) -> Result<usize, Error> {
    if offset > size {
        return Err(Error::OffsetOutOfBounds { offset, len, size });
    }
    Ok(len.min(size - offset))
}

/// Range of the `u64` at `offset`, if it lies entirely inside an arena of `size` bytes.
pub(crate) fn word(offset: usize, size: usize) -> Result<std::ops::Range<usize>, Error> {
    match offset.checked_add(U64_SIZE) {
        Some(end) if end <= size => Ok(offset..end),
        _ => Err(Error::OffsetOutOfBounds {
            offset,
            len: U64_SIZE,
            size,
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SIZE: usize = 64;

    /// Run the checks every [Storage] implementation must pass.
    ///
    /// `storage` must not contain any arenas.
    pub(crate) fn run_storage_tests<S: Storage>(storage: S) {
        test_open_and_write(&storage);
        test_read_truncates_at_end(&storage);
        test_read_out_of_bounds(&storage);
        test_u64_big_endian(&storage);
        test_u64_out_of_bounds(&storage);
        test_reopen_preserves_data(&storage);
        test_size_mismatch(&storage);
        test_scan(&storage);
    }

    fn test_open_and_write<S: Storage>(storage: &S) {
        let mut arena = storage.open(0, SIZE).unwrap();
        assert_eq!(arena.size(), SIZE);

        // Fresh arenas are zero-filled
        let mut buf = [0xffu8; SIZE];
        assert_eq!(arena.read(&mut buf, 0).unwrap(), SIZE);
        assert!(buf.iter().all(|b| *b == 0));

        assert_eq!(arena.write(b"hello world", 3).unwrap(), 11);
        let mut buf = [0u8; 11];
        assert_eq!(arena.read(&mut buf, 3).unwrap(), 11);
        assert_eq!(&buf, b"hello world");
    }

    fn test_read_truncates_at_end<S: Storage>(storage: &S) {
        let mut arena = storage.open(0, SIZE).unwrap();

        // Writes stop at the end of the arena
        assert_eq!(arena.write(b"abcdefgh", SIZE - 4).unwrap(), 4);

        // So do reads
        let mut buf = [0u8; 8];
        assert_eq!(arena.read(&mut buf, SIZE - 4).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(&buf[4..], &[0u8; 4]);

        // Reading at the end returns nothing
        assert_eq!(arena.read(&mut buf, SIZE).unwrap(), 0);

        // Empty reads are fine anywhere in bounds
        assert_eq!(arena.read(&mut [], 7).unwrap(), 0);
    }

    fn test_read_out_of_bounds<S: Storage>(storage: &S) {
        let mut arena = storage.open(0, SIZE).unwrap();
        let mut buf = [0u8; 1];
        assert!(matches!(
            arena.read(&mut buf, SIZE + 1),
            Err(Error::OffsetOutOfBounds { offset, len: 1, size: SIZE }) if offset == SIZE + 1
        ));
        assert!(matches!(
            arena.write(&buf, SIZE + 1),
            Err(Error::OffsetOutOfBounds { .. })
        ));
    }

    fn test_u64_big_endian<S: Storage>(storage: &S) {
        let mut arena = storage.open(0, SIZE).unwrap();
        arena.write_u64(16, 3).unwrap();
        let mut buf = [0u8; U64_SIZE];
        arena.read(&mut buf, 16).unwrap();
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 0, 3]);
        assert_eq!(arena.read_u64(16).unwrap(), 3);

        // Last slot that fits
        arena.write_u64(SIZE - U64_SIZE, u64::MAX).unwrap();
        assert_eq!(arena.read_u64(SIZE - U64_SIZE).unwrap(), u64::MAX);
    }

    fn test_u64_out_of_bounds<S: Storage>(storage: &S) {
        let mut arena = storage.open(0, SIZE).unwrap();
        for offset in SIZE - U64_SIZE + 1..=SIZE {
            assert!(matches!(
                arena.read_u64(offset),
                Err(Error::OffsetOutOfBounds { len: U64_SIZE, .. })
            ));
            assert!(matches!(
                arena.write_u64(offset, 1),
                Err(Error::OffsetOutOfBounds { .. })
            ));
        }
        assert!(matches!(
            arena.read_u64(usize::MAX),
            Err(Error::OffsetOutOfBounds { .. })
        ));
    }

    fn test_reopen_preserves_data<S: Storage>(storage: &S) {
        {
            let mut arena = storage.open(1, SIZE).unwrap();
            arena.write(b"persisted", 0).unwrap();
            arena.sync().unwrap();
        }
        let arena = storage.open(1, SIZE).unwrap();
        let mut buf = [0u8; 9];
        arena.read(&mut buf, 0).unwrap();
        assert_eq!(&buf, b"persisted");
    }

    fn test_size_mismatch<S: Storage>(storage: &S) {
        assert!(matches!(
            storage.open(1, SIZE / 2),
            Err(Error::SizeMismatch { id: 1, expected, found: SIZE }) if expected == SIZE / 2
        ));
    }

    fn test_scan<S: Storage>(storage: &S) {
        storage.open(5, SIZE).unwrap();
        assert_eq!(storage.scan().unwrap(), vec![0, 1, 5]);
    }

    #[test]
    fn test_bounded() {
        assert_eq!(bounded(0, 10, 16).unwrap(), 10);
        assert_eq!(bounded(10, 10, 16).unwrap(), 6);
        assert_eq!(bounded(16, 10, 16).unwrap(), 0);
        assert!(bounded(17, 0, 16).is_err());
    }

    #[test]
    fn test_word() {
        assert_eq!(word(8, 16).unwrap(), 8..16);
        assert!(word(9, 16).is_err());
        assert!(word(usize::MAX - 3, 16).is_err());
    }
}
