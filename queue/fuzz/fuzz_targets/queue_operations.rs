#![no_main]

use arbitrary::{Arbitrary, Result, Unstructured};
use bigqueue::{index::memory::Index, Config, Error, Queue};
use bigqueue_arena::memory::Storage;
use libfuzzer_sys::fuzz_target;
use prometheus_client::registry::Registry;
use std::{collections::VecDeque, num::NonZeroUsize};

/// Maximum size of an enqueued record.
const MAX_RECORD: usize = 256;

fn bounded_arena_size(u: &mut Unstructured<'_>) -> Result<usize> {
    u.int_in_range(8..=64)
}

fn bounded_record(u: &mut Unstructured<'_>) -> Result<Vec<u8>> {
    let len = u.int_in_range(0..=MAX_RECORD)?;
    Ok(u.bytes(len)?.to_vec())
}

#[derive(Arbitrary, Debug, Clone)]
enum QueueOperation {
    /// Append a record.
    Enqueue {
        #[arbitrary(with = bounded_record)]
        record: Vec<u8>,
    },

    /// Consume the record at the head.
    Dequeue,

    /// Read the record at the head without consuming it.
    Peek,

    /// Flush arenas and index.
    Sync,

    /// Close the queue and initialize it again over the same storage.
    Reopen,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// Size of each arena.
    #[arbitrary(with = bounded_arena_size)]
    arena_size: usize,
    /// Sequence of operations to execute.
    operations: Vec<QueueOperation>,
}

fn open(storage: &Storage, index: &Index, arena_size: usize) -> Queue<Storage, Index> {
    let cfg = Config {
        arena_size: NonZeroUsize::new(arena_size).unwrap(),
    };
    let mut registry = Registry::default();
    Queue::init(storage.clone(), index.clone(), cfg, &mut registry).unwrap()
}

fn fuzz(input: FuzzInput) {
    let storage = Storage::default();
    let index = Index::default();
    let mut queue = open(&storage, &index, input.arena_size);
    let mut reference = VecDeque::new();

    for op in input.operations.iter() {
        match op {
            QueueOperation::Enqueue { record } => {
                let tail = queue.tail();
                let position = queue.enqueue(record).unwrap();
                assert!(position >= tail, "record written before the tail");
                assert!(queue.tail() > position, "tail did not move");
                reference.push_back(record.clone());
            }
            QueueOperation::Dequeue => match reference.pop_front() {
                Some(expected) => {
                    let head = queue.head();
                    assert_eq!(queue.dequeue().unwrap(), expected, "dequeue mismatch");
                    assert!(queue.head() > head, "head did not move");
                }
                None => assert!(matches!(queue.dequeue(), Err(Error::EmptyQueue))),
            },
            QueueOperation::Peek => {
                let head = queue.head();
                match reference.front() {
                    Some(expected) => {
                        assert_eq!(&queue.peek().unwrap(), expected, "peek mismatch")
                    }
                    None => assert!(matches!(queue.peek(), Err(Error::EmptyQueue))),
                }
                assert_eq!(queue.head(), head, "peek moved the head");
            }
            QueueOperation::Sync => queue.sync().unwrap(),
            QueueOperation::Reopen => {
                queue.close().unwrap();
                queue = open(&storage, &index, input.arena_size);
            }
        }
        assert_eq!(queue.is_empty(), reference.is_empty(), "emptiness mismatch");
        assert!(queue.head() <= queue.tail(), "head passed the tail");
    }
}

fuzz_target!(|input: FuzzInput| {
    fuzz(input);
});
