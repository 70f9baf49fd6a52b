use crate::protocol::types::{CreationTimestamp, Record, ReplicationTimestamp};

// Only the semantic content of each message lives here. Framing and encoding belong to whoever
// implements `Connection`.

/// A message sent by the replica to the master.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SlaveMessage {
    // No state change.
    Hello,

    // Updates the slave identity persisted in the store.
    Introduce {
        database_creation_timestamp: CreationTimestamp,
    },

    // Starts a backfill-and-realtime-stream task seeded with `since_when`.
    BackfillRequest { since_when: ReplicationTimestamp },

    // Synchronization checkpoint between master and replica clocks.
    TimeBarrier { timestamp: ReplicationTimestamp },

    // Reverse backfill: the replica pushes a record the master is missing.
    BackfillRecord(Record),

    // Reverse backfill: the replica has pushed everything up to `timestamp`.
    BackfillDone { timestamp: ReplicationTimestamp },
}

/// A message sent by the master to the replica.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MasterMessage {
    Hello,

    // Historical data changed at or after the requested `since_when`.
    BackfillRecord(Record),

    // Backfill phase finished. Everything after this is realtime.
    BackfillDone { timestamp: ReplicationTimestamp },

    // A live write, forwarded as it happens.
    Realtime(Record),
}
