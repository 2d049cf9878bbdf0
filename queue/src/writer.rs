//! Encoding of length-prefixed records into consecutive arenas.

use crate::{Error, Position};
use bigqueue_arena::{Arena, Storage, U64_SIZE};
use tracing::debug;

/// Return the arena with the given `id`, opening it from `storage` if it is the next one.
fn arena_mut<'a, S: Storage>(
    storage: &S,
    arenas: &'a mut Vec<S::Arena>,
    id: u64,
    arena_size: usize,
) -> Result<&'a mut S::Arena, Error> {
    let len = arenas.len();
    let index = usize::try_from(id).map_err(|_| Error::ArenaOutOfRange(id, len))?;
    if index == len {
        arenas.push(storage.open(id, arena_size)?);
        debug!(arena = id, "allocated arena");
    }
    arenas
        .get_mut(index)
        .ok_or(Error::ArenaOutOfRange(id, len))
}

/// Write `item` as a record at `tail`, opening new arenas as needed.
///
/// Returns the position of the record (its length prefix) and the new tail.
pub(crate) fn write_record<S: Storage>(
    storage: &S,
    arenas: &mut Vec<S::Arena>,
    tail: Position,
    item: &[u8],
    arena_size: usize,
) -> Result<(Position, Position), Error> {
    let record = tail.fit(U64_SIZE, arena_size);
    arena_mut(storage, arenas, record.arena, arena_size)?
        .write_u64(record.offset, item.len() as u64)?;

    let mut cursor = record.advance(U64_SIZE, arena_size);
    let mut written = 0;
    while written < item.len() {
        let n = arena_mut(storage, arenas, cursor.arena, arena_size)?
            .write(&item[written..], cursor.offset)?;
        if n == 0 {
            return Err(Error::WriteStalled {
                position: cursor,
                remaining: item.len() - written,
            });
        }
        written += n;
        cursor = cursor.advance(n, arena_size);
    }
    Ok((record, cursor))
}
