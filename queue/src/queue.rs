//! The queue: record layout over an arena sequence plus a persisted head and tail.

use crate::{index::Index, metrics::Metrics, reader, writer, Config, Error, Position};
use bigqueue_arena::{Arena, Storage, U64_SIZE};
use bytes::Bytes;
use prometheus_client::registry::Registry;
use tracing::debug;

/// A FIFO queue of length-prefixed records stored across fixed-size arenas.
///
/// # Ownership
///
/// Reads and writes are synchronous and take `&mut self` whenever they commit a position, so a
/// queue has exactly one reader and one writer at a time. [Queue::peek] takes `&self` because it
/// never mutates the arenas or the index.
///
/// # Durability
///
/// The [Index] decides when a committed head or tail survives a restart. Arena bytes are only
/// guaranteed to be durable after [Queue::sync].
pub struct Queue<S: Storage, I: Index> {
    storage: S,
    index: I,

    /// Open arenas, where the arena with id `i` is at index `i`.
    arenas: Vec<S::Arena>,
    arena_size: usize,

    metrics: Metrics,
}

impl<S: Storage, I: Index> Queue<S, I> {
    /// Initialize a queue over the arenas in `storage` and the positions in `index`.
    ///
    /// # Errors
    ///
    /// - [Error::InvalidConfig] if `cfg.arena_size` cannot hold a length prefix.
    /// - [Error::ArenaMissing] if the arena ids in `storage` are not contiguous from 0.
    /// - [Error::ArenaOutOfRange] or [Error::IndexCorrupt] if the index does not fit the arenas.
    pub fn init(storage: S, index: I, cfg: Config, registry: &mut Registry) -> Result<Self, Error> {
        let arena_size = cfg.arena_size.get();
        if arena_size < U64_SIZE {
            return Err(Error::InvalidConfig("arena_size must hold a length prefix"));
        }

        // Open existing arenas
        let ids = storage.scan()?;
        let mut arenas = Vec::with_capacity(ids.len());
        for (expected, id) in (0u64..).zip(ids) {
            if id != expected {
                return Err(Error::ArenaMissing(expected));
            }
            arenas.push(storage.open(id, arena_size)?);
        }

        // Check the index against the arenas
        let head = index.head();
        let tail = index.tail();
        for position in [head, tail] {
            check(position, arenas.len(), arena_size)?;
        }
        if head > tail {
            return Err(Error::IndexCorrupt(format!(
                "head {head} is after tail {tail}"
            )));
        }

        let metrics = Metrics::init(registry);
        metrics.arenas.set(arenas.len() as i64);
        metrics.head_arena.set(head.arena as i64);
        metrics.tail_arena.set(tail.arena as i64);
        debug!(arenas = arenas.len(), %head, %tail, "initialized queue");

        Ok(Self {
            storage,
            index,
            arenas,
            arena_size,
            metrics,
        })
    }

    /// Append `item` at the tail.
    ///
    /// Returns the position of the record.
    pub fn enqueue(&mut self, item: &[u8]) -> Result<Position, Error> {
        let (record, tail) = writer::write_record(
            &self.storage,
            &mut self.arenas,
            self.index.tail(),
            item,
            self.arena_size,
        )?;
        self.index.put_tail(tail)?;

        self.metrics.enqueued.inc();
        self.metrics.arenas.set(self.arenas.len() as i64);
        self.metrics.tail_arena.set(tail.arena as i64);
        debug!(
            arena = record.arena,
            offset = record.offset,
            len = item.len(),
            "enqueued record"
        );
        Ok(record)
    }

    /// Read the record at the head without consuming it.
    ///
    /// Returns [Error::EmptyQueue] if there is nothing to read.
    pub fn peek(&self) -> Result<Bytes, Error> {
        let (_, item) = self.read_head()?;
        Ok(item)
    }

    /// Read the record at the head and move the head past it.
    ///
    /// The head only moves once the whole record was read. If reading fails, the head is left
    /// where it was.
    ///
    /// Returns [Error::EmptyQueue] if there is nothing to read.
    pub fn dequeue(&mut self) -> Result<Bytes, Error> {
        let (head, item) = self.read_head()?;
        self.index.put_head(head)?;

        self.metrics.dequeued.inc();
        self.metrics.dequeued_bytes.inc_by(item.len() as u64);
        self.metrics.head_arena.set(head.arena as i64);
        debug!(
            arena = head.arena,
            offset = head.offset,
            len = item.len(),
            "dequeued record"
        );
        Ok(item)
    }

    fn read_head(&self) -> Result<(Position, Bytes), Error> {
        if self.is_empty() {
            return Err(Error::EmptyQueue);
        }
        reader::read_record(
            &self.arenas,
            self.index.head(),
            self.index.tail(),
            self.arena_size,
        )
    }

    /// Whether there are no records to read.
    pub fn is_empty(&self) -> bool {
        self.index.head() == self.index.tail()
    }

    /// Position of the next record to read.
    pub fn head(&self) -> Position {
        self.index.head()
    }

    /// Position of the next free byte.
    pub fn tail(&self) -> Position {
        self.index.tail()
    }

    /// Number of arenas in the sequence.
    pub fn arenas(&self) -> usize {
        self.arenas.len()
    }

    /// Flush all arenas, then the index.
    pub fn sync(&self) -> Result<(), Error> {
        for arena in &self.arenas {
            arena.sync()?;
        }
        self.index.sync()
    }

    /// Sync and close the queue.
    pub fn close(self) -> Result<(), Error> {
        self.sync()?;
        debug!(head = %self.head(), tail = %self.tail(), "closed queue");
        Ok(())
    }
}

/// Check that a persisted cursor points into the arena sequence.
///
/// A cursor may sit at the start of the arena right after the last one: that arena is opened when
/// the first byte is written to it.
fn check(position: Position, arenas: usize, arena_size: usize) -> Result<(), Error> {
    if position.offset >= arena_size {
        return Err(Error::IndexCorrupt(format!(
            "offset of {position} is not inside an arena of {arena_size} bytes"
        )));
    }
    let next = arenas as u64;
    if position.arena > next || (position.arena == next && position.offset != 0) {
        return Err(Error::ArenaOutOfRange(position.arena, arenas));
    }
    Ok(())
}
