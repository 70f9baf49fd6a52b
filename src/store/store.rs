use crate::order_source::OrderToken;
use crate::protocol::{CreationTimestamp, Record, ReplicationTimestamp};
use tokio::sync::broadcast;

/// Keys longer than this are rejected.
pub const MAX_KEY_SIZE: usize = 250;

/// KeyValueStore is the storage engine under the replication master. The master only needs the
/// replication-facing part of it.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Creation timestamp of the replica last associated with this master. `CreationTimestamp::NONE`
    /// if there never was one. Persisted.
    fn replication_slave_id(&self) -> CreationTimestamp;

    fn set_replication_slave_id(&self, slave_id: CreationTimestamp);

    /// Atomically collect every record changed at or after `since_when` and subscribe to writes
    /// made after the collection. No write is in both halves and none is missing from both.
    fn snapshot_since(&self, since_when: ReplicationTimestamp) -> StoreSnapshot;

    /// Apply a record received from a replica. `order` must be newer than any token applied before.
    fn apply(&self, record: Record, order: OrderToken) -> Result<(), StoreError>;

    fn replication_clock(&self) -> ReplicationTimestamp;

    /// Move the replication clock to `timestamp` if it is ahead. Never moves it backwards.
    fn advance_replication_clock(&self, timestamp: ReplicationTimestamp);
}

pub struct StoreSnapshot {
    /// Oldest first. Records with the same timestamp are ordered by key.
    pub records: Vec<Record>,
    /// Replication clock at the moment of the snapshot.
    pub timestamp: ReplicationTimestamp,
    pub realtime: broadcast::Receiver<Record>,
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Record key is empty")]
    EmptyKey,
    #[error("Record key is {0} bytes, limit is {}", MAX_KEY_SIZE)]
    KeyTooLong(usize),
    #[error("Write out of order: {attempted:?} is not after {last_applied:?}")]
    OutOfOrder {
        attempted: OrderToken,
        last_applied: OrderToken,
    },
}

pub(crate) fn validate_key(key: &[u8]) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(StoreError::KeyTooLong(key.len()));
    }

    Ok(())
}
