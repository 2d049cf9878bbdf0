//! Persistence of the queue's head and tail.
//!
//! The [Index] is the only place the head lives: the queue reads it at the start of every
//! operation and never caches it.

use crate::{Error, Position};

pub mod disk;
pub mod memory;

/// Stores the head and tail positions of a queue.
pub trait Index {
    /// Position of the next record to read.
    fn head(&self) -> Position;

    /// Position of the next free byte.
    fn tail(&self) -> Position;

    /// Commit a new head.
    ///
    /// Once this returns, the new head must survive a restart.
    fn put_head(&mut self, head: Position) -> Result<(), Error>;

    /// Commit a new tail.
    fn put_tail(&mut self, tail: Position) -> Result<(), Error>;

    /// Ensure all committed positions are durably persisted.
    fn sync(&self) -> Result<(), Error>;
}
