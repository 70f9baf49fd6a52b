use crate::protocol::{CreationTimestamp, MasterMessage, Record, ReplicationTimestamp};
use crate::stream::{ConnectionError, ConnectionId};

/// ReplicationReceiver is everything a replica can ask of the master. A `ReplicationStream`
/// dispatches inbound messages into it one at a time, in arrival order.
#[async_trait::async_trait]
pub trait ReplicationReceiver: Send + Sync + 'static {
    async fn hello(&self);

    async fn introduce(&self, database_creation_timestamp: CreationTimestamp);

    /// Must not wait for the backfill to finish.
    async fn backfill(&self, connection: ConnectionId, since_when: ReplicationTimestamp);

    async fn time_barrier(&self, timestamp: ReplicationTimestamp);

    async fn reverse_backfill_record(&self, record: Record);

    async fn reverse_backfill_done(&self, timestamp: ReplicationTimestamp);

    /// The transport under `connection` has closed. Delivered at most once per connection.
    async fn conn_closed(&self, connection: ConnectionId);
}

/// BackfillSender is the outbound half: something that can push messages to the replica.
#[async_trait::async_trait]
pub trait BackfillSender: Send + Sync {
    async fn send(&self, message: MasterMessage) -> Result<(), ConnectionError>;
}
