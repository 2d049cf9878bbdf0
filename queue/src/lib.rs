//! A disk-backed FIFO queue of length-prefixed records stored across fixed-size arenas.
//!
//! # Status
//!
//! `bigqueue` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.
//!
//! # Format
//!
//! The queue is a single logical byte stream partitioned into arenas of
//! [Config::arena_size] bytes each (see [bigqueue_arena]). A location in the stream is a
//! [Position]: an arena id and a byte offset inside that arena. Records are appended at the tail
//! and consumed from the head:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 |10 |11 |12 |13 |14 |15 |
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! |        Length (u64, BE)       |        Payload ...
//! +---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! _The length prefix is never split between arenas. If fewer than 8 bytes remain in the current
//! arena, those bytes are skipped and the prefix starts at offset 0 of the next arena. The payload
//! is not padded: it continues at offset 0 of the next arena for as many arenas as it needs._
//!
//! # Head and Tail
//!
//! The head (next record to read) and tail (next free byte) are persisted by an [index::Index].
//! The queue is empty when they are equal. [Queue::peek] never moves the head, [Queue::dequeue]
//! moves it past the record it returns, and only after the whole record was read.
//!
//! # Example
//!
//! ```rust
//! use bigqueue::{index::memory::Index, Config, Queue};
//! use bigqueue_arena::memory::Storage;
//! use prometheus_client::registry::Registry;
//! use std::num::NonZeroUsize;
//!
//! let cfg = Config {
//!     arena_size: NonZeroUsize::new(16).unwrap(),
//! };
//! let mut registry = Registry::default();
//! let mut queue = Queue::init(Storage::default(), Index::default(), cfg, &mut registry).unwrap();
//!
//! // A record larger than an arena is spread over several of them
//! queue.enqueue(b"a record longer than one arena").unwrap();
//! queue.enqueue(b"short").unwrap();
//!
//! assert_eq!(queue.peek().unwrap(), &b"a record longer than one arena"[..]);
//! assert_eq!(queue.dequeue().unwrap(), &b"a record longer than one arena"[..]);
//! assert_eq!(queue.dequeue().unwrap(), &b"short"[..]);
//! assert!(queue.is_empty());
//! ```

use bigqueue_arena::Error as ArenaError;
use std::num::NonZeroUsize;
use thiserror::Error;

pub mod index;
mod metrics;
mod position;
mod queue;
mod reader;
mod writer;

pub use position::Position;
pub use queue::Queue;

/// Errors that can occur when interacting with the queue.
#[derive(Debug, Error)]
pub enum Error {
    #[error("queue is empty")]
    EmptyQueue,
    #[error("read failed at {position}: requested={requested} error: {source}")]
    ReadFailed {
        position: Position,
        requested: usize,
        source: ArenaError,
    },
    #[error("read stalled at {position}: remaining={remaining}")]
    ReadStalled { position: Position, remaining: usize },
    #[error("write stalled at {position}: remaining={remaining}")]
    WriteStalled { position: Position, remaining: usize },
    #[error("arena out of range: {0} (arenas={1})")]
    ArenaOutOfRange(u64, usize),
    #[error("arena missing: {0}")]
    ArenaMissing(u64),
    #[error("record out of bounds at {position}: len={len} available={available}")]
    RecordOutOfBounds {
        position: Position,
        len: u64,
        available: u64,
    },
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("arena error: {0}")]
    Arena(#[from] ArenaError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for [Queue].
#[derive(Clone)]
pub struct Config {
    /// The size of each arena in bytes.
    ///
    /// Must be at least 8 bytes so a length prefix always fits in one arena. Once set, this
    /// value cannot be changed across restarts.
    pub arena_size: NonZeroUsize,
}
