//! A [crate::Storage] wrapper that records arena activity in a [Registry].

use crate::Error;
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use std::sync::Arc;

pub struct Metrics {
    pub open_arenas: Gauge,
    pub arena_reads: Counter,
    pub arena_read_bytes: Counter,
    pub arena_writes: Counter,
    pub arena_write_bytes: Counter,
}

impl Metrics {
    /// Initialize the `Metrics` struct and register the metrics in the provided registry.
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            open_arenas: Gauge::default(),
            arena_reads: Counter::default(),
            arena_read_bytes: Counter::default(),
            arena_writes: Counter::default(),
            arena_write_bytes: Counter::default(),
        };

        registry.register(
            "open_arenas",
            "Number of open arenas",
            metrics.open_arenas.clone(),
        );
        registry.register(
            "arena_reads",
            "Total number of arena reads",
            metrics.arena_reads.clone(),
        );
        registry.register(
            "arena_read_bytes",
            "Total amount of data read from arenas",
            metrics.arena_read_bytes.clone(),
        );
        registry.register(
            "arena_writes",
            "Total number of arena writes",
            metrics.arena_writes.clone(),
        );
        registry.register(
            "arena_write_bytes",
            "Total amount of data written to arenas",
            metrics.arena_write_bytes.clone(),
        );

        metrics
    }
}

/// A wrapper around a `Storage` implementation that tracks metrics.
#[derive(Clone)]
pub struct Storage<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S> Storage<S> {
    pub fn new(inner: S, registry: &mut Registry) -> Self {
        Self {
            inner,
            metrics: Metrics::new(registry).into(),
        }
    }

    /// Metrics shared by this storage and every arena it opened.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

impl<S: crate::Storage> crate::Storage for Storage<S> {
    type Arena = Arena<S::Arena>;

    fn open(&self, id: u64, size: usize) -> Result<Self::Arena, Error> {
        let inner = self.inner.open(id, size)?;
        self.metrics.open_arenas.inc();
        Ok(Arena {
            inner,
            metrics: self.metrics.clone(),
        })
    }

    fn scan(&self) -> Result<Vec<u64>, Error> {
        self.inner.scan()
    }
}

/// A wrapper around an `Arena` implementation that tracks metrics.
///
/// Dropping the arena decrements the `open_arenas` gauge.
pub struct Arena<A> {
    inner: A,
    metrics: Arc<Metrics>,
}

impl<A: crate::Arena> crate::Arena for Arena<A> {
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn read_u64(&self, offset: usize) -> Result<u64, Error> {
        let value = self.inner.read_u64(offset)?;
        self.metrics.arena_reads.inc();
        self.metrics.arena_read_bytes.inc_by(crate::U64_SIZE as u64);
        Ok(value)
    }

    fn read(&self, buf: &mut [u8], offset: usize) -> Result<usize, Error> {
        let len = self.inner.read(buf, offset)?;
        self.metrics.arena_reads.inc();
        self.metrics.arena_read_bytes.inc_by(len as u64);
        Ok(len)
    }

    fn write_u64(&mut self, offset: usize, value: u64) -> Result<(), Error> {
        self.inner.write_u64(offset, value)?;
        self.metrics.arena_writes.inc();
        self.metrics.arena_write_bytes.inc_by(crate::U64_SIZE as u64);
        Ok(())
    }

    fn write(&mut self, buf: &[u8], offset: usize) -> Result<usize, Error> {
        let len = self.inner.write(buf, offset)?;
        self.metrics.arena_writes.inc();
        self.metrics.arena_write_bytes.inc_by(len as u64);
        Ok(len)
    }

    fn sync(&self) -> Result<(), Error> {
        self.inner.sync()
    }
}

impl<A> Drop for Arena<A> {
    fn drop(&mut self) {
        self.metrics.open_arenas.dec();
    }
}
