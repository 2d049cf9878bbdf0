//! Metrics for [crate::Queue].

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for [crate::Queue].
#[derive(Default)]
pub struct Metrics {
    /// Arenas in the sequence.
    pub arenas: Gauge,
    /// Arena holding the head.
    pub head_arena: Gauge,
    /// Arena holding the tail.
    pub tail_arena: Gauge,
    /// Records enqueued.
    pub enqueued: Counter,
    /// Records dequeued.
    pub dequeued: Counter,
    /// Payload bytes dequeued.
    pub dequeued_bytes: Counter,
}

impl Metrics {
    /// Create and register metrics with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register("arenas", "Arenas in the sequence", metrics.arenas.clone());
        registry.register(
            "head_arena",
            "Arena holding the head",
            metrics.head_arena.clone(),
        );
        registry.register(
            "tail_arena",
            "Arena holding the tail",
            metrics.tail_arena.clone(),
        );
        registry.register("enqueued", "Records enqueued", metrics.enqueued.clone());
        registry.register("dequeued", "Records dequeued", metrics.dequeued.clone());
        registry.register(
            "dequeued_bytes",
            "Payload bytes dequeued",
            metrics.dequeued_bytes.clone(),
        );
        metrics
    }
}
