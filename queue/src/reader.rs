//! Decoding of length-prefixed records that may span several arenas.
//!
//! Every function here borrows the arena sequence read-only and returns the position right after
//! what it read. Nothing is committed: moving the head is left to the caller.

use crate::{Error, Position};
use bigqueue_arena::{Arena, Error as ArenaError, U64_SIZE};
use bytes::Bytes;
use tracing::{trace, warn};

/// Look up the arena with the given `id`.
pub(crate) fn arena<A>(arenas: &[A], id: u64) -> Result<&A, Error> {
    usize::try_from(id)
        .ok()
        .and_then(|index| arenas.get(index))
        .ok_or(Error::ArenaOutOfRange(id, arenas.len()))
}

/// Read up to `buf.len()` bytes at `position`, stopping at the end of its arena.
///
/// A count larger than the request or the room left in the arena is a failed read.
fn read_at<A: Arena>(
    arenas: &[A],
    position: Position,
    buf: &mut [u8],
    arena_size: usize,
) -> Result<usize, Error> {
    let requested = buf.len();
    let read = arena(arenas, position.arena)?
        .read(buf, position.offset)
        .map_err(|source| Error::ReadFailed {
            position,
            requested,
            source,
        })?;
    if read > requested || Position::will_cross(position.offset, read, arena_size) {
        return Err(Error::ReadFailed {
            position,
            requested,
            source: ArenaError::OffsetOutOfBounds {
                offset: position.offset,
                len: read,
                size: arena_size,
            },
        });
    }
    Ok(read)
}

/// Decode the length prefix of the record at `position`.
///
/// Returns the position of the first payload byte and the payload length.
pub(crate) fn read_length<A: Arena>(
    arenas: &[A],
    position: Position,
    arena_size: usize,
) -> Result<(Position, u64), Error> {
    let position = position.fit(U64_SIZE, arena_size);
    let len = arena(arenas, position.arena)?
        .read_u64(position.offset)
        .map_err(|source| Error::ReadFailed {
            position,
            requested: U64_SIZE,
            source,
        })?;
    Ok((position.advance(U64_SIZE, arena_size), len))
}

/// Read `len` payload bytes starting at `position`.
///
/// Returns the position after the last byte read and the payload.
pub(crate) fn read_payload<A: Arena>(
    arenas: &[A],
    position: Position,
    len: usize,
    arena_size: usize,
) -> Result<(Position, Vec<u8>), Error> {
    if len == 0 {
        return Ok((position, Vec::new()));
    }
    let mut buf = vec![0u8; len];

    // The payload lies in a single arena
    if !Position::will_cross(position.offset, len, arena_size) {
        let read = read_at(arenas, position, &mut buf, arena_size)?;
        if read != len {
            warn!(%position, read, len, "short read");
            return Err(Error::ReadStalled {
                position: Position::new(position.arena, position.offset + read),
                remaining: len - read,
            });
        }
        return Ok((position.advance(len, arena_size), buf));
    }

    // Stitch the payload together from consecutive arenas
    let mut cursor = position;
    let mut written = 0;
    while written < len {
        let read = read_at(arenas, cursor, &mut buf[written..], arena_size)?;
        if read == 0 {
            warn!(position = %cursor, remaining = len - written, "read stalled");
            return Err(Error::ReadStalled {
                position: cursor,
                remaining: len - written,
            });
        }
        written += read;
        trace!(
            arena = cursor.arena,
            offset = cursor.offset,
            read,
            remaining = len - written,
            "read partial payload"
        );
        cursor = cursor.advance(read, arena_size);
    }
    Ok((cursor, buf))
}

/// Read the record at `head`, which must come before `tail`.
///
/// The decoded length is checked against the bytes available before `tail` before any payload
/// buffer is allocated.
///
/// Returns the position after the record and its payload.
pub(crate) fn read_record<A: Arena>(
    arenas: &[A],
    head: Position,
    tail: Position,
    arena_size: usize,
) -> Result<(Position, Bytes), Error> {
    let (start, len) = read_length(arenas, head, arena_size)?;
    let available = start.distance(tail, arena_size).unwrap_or(0);
    let out_of_bounds = Error::RecordOutOfBounds {
        position: head,
        len,
        available,
    };
    if start > tail || len > available {
        return Err(out_of_bounds);
    }
    let len = usize::try_from(len).map_err(|_| out_of_bounds)?;

    let (next, payload) = read_payload(arenas, start, len, arena_size)?;
    Ok((next, Bytes::from(payload)))
}
