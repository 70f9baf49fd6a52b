use crate::order_source::OrderSource;
use crate::protocol::{Record, ReplicationTimestamp};
use crate::store::{validate_key, KeyValueStore, StoreError};
use std::sync::{Arc, Mutex};

/// BackfillStorer applies what a replica pushes back to the master while it reverse-backfills.
/// It is passive: whatever reads the inbound side of the connection drives it.
pub(crate) struct BackfillStorer<S, O> {
    logger: slog::Logger,
    store: Arc<S>,
    order_source: Arc<O>,
    window: Mutex<ReverseBackfillWindow>,
}

#[derive(Default)]
struct ReverseBackfillWindow {
    active: bool,
    records_applied: u64,
    records_rejected: u64,
}

#[derive(Debug)]
pub(crate) struct StoredRecord {
    // True if this record was the first of a reverse backfill.
    pub(crate) opened_window: bool,
    pub(crate) result: Result<(), StoreError>,
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct ReverseBackfillSummary {
    pub(crate) records_applied: u64,
    pub(crate) records_rejected: u64,
}

impl<S, O> BackfillStorer<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    pub(crate) fn new(logger: slog::Logger, store: Arc<S>, order_source: Arc<O>) -> Self {
        BackfillStorer {
            logger,
            store,
            order_source,
            window: Mutex::new(ReverseBackfillWindow::default()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.lock().active
    }

    pub(crate) fn store_record(&self, record: Record) -> StoredRecord {
        let mut window = self.lock();

        let opened_window = !window.active;
        if opened_window {
            slog::info!(self.logger, "Reverse backfill from slave started.");
            *window = ReverseBackfillWindow {
                active: true,
                ..ReverseBackfillWindow::default()
            };
        }

        let result = self.apply(record);
        match &result {
            Ok(()) => window.records_applied += 1,
            Err(e) => {
                slog::warn!(self.logger, "Rejected reverse backfill record: {}", e);
                window.records_rejected += 1;
            }
        }

        StoredRecord { opened_window, result }
    }

    fn apply(&self, record: Record) -> Result<(), StoreError> {
        // Validate before checking in, so rejected records don't take a position in the order.
        validate_key(&record.key)?;
        let order = self.order_source.check_in();

        self.store.apply(record, order)
    }

    pub(crate) fn backfill_done(&self, timestamp: ReplicationTimestamp) -> ReverseBackfillSummary {
        self.store.advance_replication_clock(timestamp);

        let mut window = self.lock();
        let summary = ReverseBackfillSummary {
            records_applied: window.records_applied,
            records_rejected: window.records_rejected,
        };
        *window = ReverseBackfillWindow::default();

        slog::info!(
            self.logger,
            "Reverse backfill from slave finished at {:?}: {} records applied, {} rejected.",
            timestamp,
            summary.records_applied,
            summary.records_rejected,
        );
        summary
    }

    /// Time barriers advance the replication clock so that writes the master takes after the
    /// barrier sort after everything the replica already has.
    pub(crate) fn time_barrier(&self, timestamp: ReplicationTimestamp) {
        slog::debug!(self.logger, "Time barrier at {:?}", timestamp);
        self.store.advance_replication_clock(timestamp);
    }

    pub(crate) fn connection_lost(&self) {
        let mut window = self.lock();
        if window.active {
            slog::warn!(
                self.logger,
                "Connection to slave lost during reverse backfill after {} records. Master data may be \
                 incomplete until the slave reconnects.",
                window.records_applied,
            );
        }

        *window = ReverseBackfillWindow::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReverseBackfillWindow> {
        self.window.lock().expect("BackfillStorer mutex guard poison")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order_source::SequentialOrderSource;
    use crate::store::{InMemoryStore, MAX_KEY_SIZE};
    use crate::test_utils::test_logger;
    use bytes::Bytes;

    fn ts(timestamp: u32) -> ReplicationTimestamp {
        ReplicationTimestamp::new(timestamp)
    }

    fn storer() -> (BackfillStorer<InMemoryStore, SequentialOrderSource>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let storer = BackfillStorer::new(test_logger(), store.clone(), Arc::new(SequentialOrderSource::new()));

        (storer, store)
    }

    #[test]
    fn reverse_backfill_window_lifecycle() {
        let (storer, store) = storer();
        assert!(!storer.is_active());

        // 1. First record opens the window.
        let first = storer.store_record(Record::set("a", "1", ts(5)));
        assert!(first.opened_window);
        assert!(first.result.is_ok());
        assert!(storer.is_active());

        // 2. Later records don't. Bad records are rejected without poisoning the window.
        let second = storer.store_record(Record::set(vec![b'x'; MAX_KEY_SIZE + 1], "2", ts(6)));
        assert!(!second.opened_window);
        assert_eq!(second.result, Err(StoreError::KeyTooLong(MAX_KEY_SIZE + 1)));
        let third = storer.store_record(Record::delete("a", ts(7)));
        assert!(third.result.is_ok());

        // 3. Done closes the window and advances the clock.
        let summary = storer.backfill_done(ts(8));
        assert_eq!(
            summary,
            ReverseBackfillSummary {
                records_applied: 2,
                records_rejected: 1
            }
        );
        assert!(!storer.is_active());
        assert_eq!(store.replication_clock(), ts(8));
        assert_eq!(store.get(b"a"), None);
    }

    #[test]
    fn applied_records_land_in_store_in_order() {
        let (storer, store) = storer();

        for i in 0..10u32 {
            let result = storer.store_record(Record::set(format!("k{}", i), "v", ts(i))).result;
            assert!(result.is_ok());
        }

        assert_eq!(store.get(b"k9"), Some(Bytes::from("v")));
        assert_eq!(store.snapshot_since(ts(0)).records.len(), 10);
    }

    #[test]
    fn time_barrier_and_connection_lost() {
        let (storer, store) = storer();

        storer.time_barrier(ts(30));
        storer.time_barrier(ts(20));
        assert_eq!(store.replication_clock(), ts(30));

        storer.store_record(Record::set("a", "1", ts(31)));
        storer.connection_lost();
        assert!(!storer.is_active());
        assert!(storer.store_record(Record::set("b", "1", ts(32))).opened_window);
    }
}
