use std::sync::atomic::{AtomicU64, Ordering};

/// OrderToken is a position in the global order of writes. Tokens handed out by one `OrderSource`
/// strictly increase.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct OrderToken(u64);

impl OrderToken {
    pub fn new(position: u64) -> Self {
        OrderToken(position)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// OrderSource is the authority for operation ordering. The replication master checks in every
/// write it applies on behalf of a replica and reports the end of each backfill/stream cycle.
pub trait OrderSource: Send + Sync + 'static {
    /// Return the next token in the global write order.
    fn check_in(&self) -> OrderToken;

    /// Called exactly once per replica connection, when its backfill/stream activity has ended,
    /// whether it completed or was interrupted.
    fn backfill_done(&self);
}

/// SequentialOrderSource hands out consecutive tokens and counts finished backfill cycles.
#[derive(Default)]
pub struct SequentialOrderSource {
    next_position: AtomicU64,
    backfills_done: AtomicU64,
}

impl SequentialOrderSource {
    pub fn new() -> Self {
        SequentialOrderSource::default()
    }

    pub fn backfills_done(&self) -> u64 {
        self.backfills_done.load(Ordering::Acquire)
    }
}

impl OrderSource for SequentialOrderSource {
    fn check_in(&self) -> OrderToken {
        OrderToken(self.next_position.fetch_add(1, Ordering::AcqRel))
    }

    fn backfill_done(&self) {
        self.backfills_done.fetch_add(1, Ordering::AcqRel);
    }
}
