use crate::order_source::OrderToken;
use crate::protocol::{CreationTimestamp, Record, ReplicationTimestamp};
use crate::store::store::{validate_key, KeyValueStore, StoreError, StoreSnapshot};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

const DEFAULT_REALTIME_CAPACITY: usize = 1024;

// Durability isn't the point here, replication is. This keeps the latest record per key
// (tombstones included) so backfill can find deletions too.
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    realtime: broadcast::Sender<Record>,
}

struct Inner {
    records: BTreeMap<Bytes, Record>,
    replication_slave_id: CreationTimestamp,
    replication_clock: ReplicationTimestamp,
    last_applied_order: Option<OrderToken>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_realtime_capacity(DEFAULT_REALTIME_CAPACITY)
    }

    /// `capacity` is how many live writes a realtime subscriber may fall behind before it lags.
    pub fn with_realtime_capacity(capacity: usize) -> Self {
        let (realtime, _) = broadcast::channel(capacity);

        InMemoryStore {
            inner: Mutex::new(Inner {
                records: BTreeMap::new(),
                replication_slave_id: CreationTimestamp::NONE,
                replication_clock: ReplicationTimestamp::DISTANT_PAST,
                last_applied_order: None,
            }),
            realtime,
        }
    }

    /// Client write. Stamped with the current replication clock and published to realtime
    /// subscribers.
    pub fn set(&self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<Record, StoreError> {
        self.write(key.into(), Some(value.into()))
    }

    /// Client delete. Leaves a tombstone so it can be backfilled.
    pub fn delete(&self, key: impl Into<Bytes>) -> Result<Record, StoreError> {
        self.write(key.into(), None)
    }

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.lock()
            .records
            .get(key)
            .and_then(|record| record.value.clone())
    }

    fn write(&self, key: Bytes, value: Option<Bytes>) -> Result<Record, StoreError> {
        validate_key(&key)?;

        let mut inner = self.lock();
        let record = Record {
            key: key.clone(),
            value,
            timestamp: inner.replication_clock,
        };
        inner.records.insert(key, record.clone());
        // Publish under the lock so `snapshot_since()` can't observe a write without also
        // receiving or excluding it consistently. No subscribers is fine.
        let _ = self.realtime.send(record.clone());

        Ok(record)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("InMemoryStore mutex guard poison")
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        InMemoryStore::new()
    }
}

impl KeyValueStore for InMemoryStore {
    fn replication_slave_id(&self) -> CreationTimestamp {
        self.lock().replication_slave_id
    }

    fn set_replication_slave_id(&self, slave_id: CreationTimestamp) {
        self.lock().replication_slave_id = slave_id;
    }

    fn snapshot_since(&self, since_when: ReplicationTimestamp) -> StoreSnapshot {
        let inner = self.lock();

        let mut records: Vec<Record> = inner
            .records
            .values()
            .filter(|record| record.timestamp >= since_when)
            .cloned()
            .collect();
        // BTreeMap already yields key order, and the sort is stable.
        records.sort_by_key(|record| record.timestamp);

        StoreSnapshot {
            records,
            timestamp: inner.replication_clock,
            realtime: self.realtime.subscribe(),
        }
    }

    fn apply(&self, record: Record, order: OrderToken) -> Result<(), StoreError> {
        validate_key(&record.key)?;

        let mut inner = self.lock();
        if let Some(last_applied) = inner.last_applied_order {
            if order <= last_applied {
                return Err(StoreError::OutOfOrder {
                    attempted: order,
                    last_applied,
                });
            }
        }

        inner.last_applied_order = Some(order);
        inner.records.insert(record.key.clone(), record);

        Ok(())
    }

    fn replication_clock(&self) -> ReplicationTimestamp {
        self.lock().replication_clock
    }

    fn advance_replication_clock(&self, timestamp: ReplicationTimestamp) {
        let mut inner = self.lock();
        if timestamp > inner.replication_clock {
            inner.replication_clock = timestamp;
        }
    }
}
