//! Arithmetic over locations in a stream partitioned into fixed-size arenas.

use std::fmt;

/// A byte in the queue's address space: an arena id and an offset inside that arena.
///
/// Positions compare by arena first, then offset. A position used as a cursor always has
/// `offset < arena_size`: advancing to the end of an arena lands on offset 0 of the next one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub arena: u64,
    pub offset: usize,
}

impl Position {
    pub const fn new(arena: u64, offset: usize) -> Self {
        Self { arena, offset }
    }

    /// Whether `n` bytes starting at `offset` run past the end of an arena of `arena_size` bytes.
    pub fn will_cross(offset: usize, n: usize, arena_size: usize) -> bool {
        offset.checked_add(n).map_or(true, |end| end > arena_size)
    }

    /// Offset 0 of the following arena.
    pub const fn next_arena(self) -> Self {
        Self::new(self.arena + 1, 0)
    }

    /// Where a fixed-size field of `n` bytes is placed when written at this position.
    ///
    /// A field that would cross the end of the arena moves, whole, to the next arena.
    pub fn fit(self, n: usize, arena_size: usize) -> Self {
        if Self::will_cross(self.offset, n, arena_size) {
            self.next_arena()
        } else {
            self
        }
    }

    /// The position `n` bytes further in the same arena.
    ///
    /// Reaching the end of the arena exactly rolls over to the next arena.
    ///
    /// # Panics
    ///
    /// Panics if the `n` bytes do not fit in the remainder of the arena.
    pub fn advance(self, n: usize, arena_size: usize) -> Self {
        let offset = self.offset + n;
        assert!(
            offset <= arena_size,
            "advanced past arena end: offset={offset} arena_size={arena_size}"
        );
        if offset == arena_size {
            self.next_arena()
        } else {
            Self::new(self.arena, offset)
        }
    }

    /// Number of bytes from this position up to (excluding) `to`.
    ///
    /// Returns `None` if `to` comes before this position or the distance does not fit in a `u64`.
    pub fn distance(self, to: Self, arena_size: usize) -> Option<u64> {
        if to < self {
            return None;
        }
        (to.arena - self.arena)
            .checked_mul(arena_size as u64)?
            .checked_add(to.offset as u64)?
            .checked_sub(self.offset as u64)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.arena, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA_SIZE: usize = 16;

    #[test]
    fn test_will_cross() {
        assert!(!Position::will_cross(0, 16, ARENA_SIZE));
        assert!(!Position::will_cross(8, 8, ARENA_SIZE));
        assert!(Position::will_cross(9, 8, ARENA_SIZE));
        assert!(Position::will_cross(15, 2, ARENA_SIZE));
        assert!(!Position::will_cross(15, 1, ARENA_SIZE));
        assert!(Position::will_cross(1, usize::MAX, ARENA_SIZE));
    }

    #[test]
    fn test_fit() {
        // Fits exactly
        assert_eq!(
            Position::new(2, 8).fit(8, ARENA_SIZE),
            Position::new(2, 8)
        );

        // Every offset that leaves fewer than 8 bytes rolls over
        for offset in ARENA_SIZE - 7..ARENA_SIZE {
            assert_eq!(
                Position::new(2, offset).fit(8, ARENA_SIZE),
                Position::new(3, 0)
            );
        }
    }

    #[test]
    fn test_advance() {
        assert_eq!(
            Position::new(0, 3).advance(5, ARENA_SIZE),
            Position::new(0, 8)
        );
        assert_eq!(
            Position::new(0, 0).advance(0, ARENA_SIZE),
            Position::new(0, 0)
        );

        // Landing on the end of the arena rolls over
        assert_eq!(
            Position::new(4, 8).advance(8, ARENA_SIZE),
            Position::new(5, 0)
        );
    }

    #[test]
    #[should_panic(expected = "advanced past arena end")]
    fn test_advance_past_end() {
        Position::new(0, 12).advance(5, ARENA_SIZE);
    }

    #[test]
    fn test_distance() {
        let head = Position::new(1, 12);
        assert_eq!(head.distance(head, ARENA_SIZE), Some(0));
        assert_eq!(head.distance(Position::new(1, 15), ARENA_SIZE), Some(3));
        assert_eq!(head.distance(Position::new(2, 0), ARENA_SIZE), Some(4));
        assert_eq!(head.distance(Position::new(4, 1), ARENA_SIZE), Some(4 + 32 + 1));
        assert_eq!(head.distance(Position::new(1, 11), ARENA_SIZE), None);
        assert_eq!(head.distance(Position::new(0, 15), ARENA_SIZE), None);
    }

    #[test]
    fn test_ordering_and_display() {
        assert!(Position::new(0, 15) < Position::new(1, 0));
        assert!(Position::new(1, 2) < Position::new(1, 3));
        assert_eq!(Position::new(7, 42).to_string(), "7:42");
    }
}
