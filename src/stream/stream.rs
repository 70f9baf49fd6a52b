use crate::protocol::{MasterMessage, SlaveMessage};
use crate::stream::roles::{BackfillSender, ReplicationReceiver};
use crate::stream::{Connection, ConnectionError};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;

/// ConnectionId tells apart successive replica connections of the same master.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) fn new(id: u64) -> Self {
        ConnectionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// ReplicationStream owns one replica connection and the task reading from it.
pub(crate) struct ReplicationStream {
    id: ConnectionId,
    connection: Arc<dyn Connection>,
    read_loop: JoinHandle<()>,
}

/// StreamSender sends on one specific connection, even after the stream it came from has been
/// replaced by a newer one.
#[derive(Clone)]
pub(crate) struct StreamSender {
    connection: Arc<dyn Connection>,
}

impl ReplicationStream {
    pub(crate) fn start(
        logger: slog::Logger,
        id: ConnectionId,
        connection: Arc<dyn Connection>,
        receiver: Weak<dyn ReplicationReceiver>,
    ) -> Self {
        let read_loop = tokio::spawn(run_read_loop(logger, id, connection.clone(), receiver));

        ReplicationStream {
            id,
            connection,
            read_loop,
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(crate) fn sender(&self) -> StreamSender {
        StreamSender {
            connection: self.connection.clone(),
        }
    }

    /// Close the transport and wait for the read loop to exit. This can block for as long as the
    /// transport takes to drain, so never call it while holding a lock other tasks need.
    pub(crate) async fn shutdown(self) {
        self.connection.close().await;
        // The read loop never panics on its own. A JoinError here means the runtime is shutting
        // down, and there's nothing left to clean up.
        let _ = self.read_loop.await;
    }
}

#[async_trait::async_trait]
impl BackfillSender for StreamSender {
    async fn send(&self, message: MasterMessage) -> Result<(), ConnectionError> {
        self.connection.send(message).await
    }
}

async fn run_read_loop(
    logger: slog::Logger,
    id: ConnectionId,
    connection: Arc<dyn Connection>,
    receiver: Weak<dyn ReplicationReceiver>,
) {
    while let Some(message) = connection.recv().await {
        let receiver = match receiver.upgrade() {
            Some(receiver) => receiver,
            None => {
                slog::debug!(logger, "Receiver is gone. Dropping {:?}", message);
                return;
            }
        };

        slog::debug!(logger, "Received {:?}", message);
        dispatch(receiver.as_ref(), id, message).await;
    }

    // The closure handler tears this stream down, which joins this task. So it has to run
    // somewhere else.
    if let Some(receiver) = receiver.upgrade() {
        tokio::spawn(async move { receiver.conn_closed(id).await });
    }
}

async fn dispatch(receiver: &dyn ReplicationReceiver, id: ConnectionId, message: SlaveMessage) {
    match message {
        SlaveMessage::Hello => receiver.hello().await,
        SlaveMessage::Introduce {
            database_creation_timestamp,
        } => receiver.introduce(database_creation_timestamp).await,
        SlaveMessage::BackfillRequest { since_when } => receiver.backfill(id, since_when).await,
        SlaveMessage::TimeBarrier { timestamp } => receiver.time_barrier(timestamp).await,
        SlaveMessage::BackfillRecord(record) => receiver.reverse_backfill_record(record).await,
        SlaveMessage::BackfillDone { timestamp } => receiver.reverse_backfill_done(timestamp).await,
    }
}
