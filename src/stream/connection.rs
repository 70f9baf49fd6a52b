use crate::protocol::{MasterMessage, SlaveMessage};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Connection is the master's end of a transport to exactly one replica. Implementations own the
/// wire format.
#[async_trait::async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn send(&self, message: MasterMessage) -> Result<(), ConnectionError>;

    /// Suspends until a message arrives. Returns `None` once the connection is closed from
    /// either side.
    async fn recv(&self) -> Option<SlaveMessage>;

    /// May suspend until outstanding sends drain. Idempotent.
    async fn close(&self);
}

#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection is closed")]
    Closed,
}

/// Create a connected pair of in-memory endpoints. Each direction buffers up to `buffer_size`
/// messages.
pub fn memory_connection(buffer_size: usize) -> (MemoryConnection, ReplicaEndpoint) {
    let (to_replica_tx, to_replica_rx) = mpsc::channel(buffer_size);
    let (to_master_tx, to_master_rx) = mpsc::channel(buffer_size);
    let closed = CancellationToken::new();

    let master_end = MemoryConnection {
        outbound: to_replica_tx,
        inbound: Mutex::new(to_master_rx),
        closed: closed.clone(),
    };
    let replica_end = ReplicaEndpoint {
        outbound: to_master_tx,
        inbound: to_replica_rx,
        closed,
    };

    (master_end, replica_end)
}

pub struct MemoryConnection {
    outbound: mpsc::Sender<MasterMessage>,
    inbound: Mutex<mpsc::Receiver<SlaveMessage>>,
    closed: CancellationToken,
}

#[async_trait::async_trait]
impl Connection for MemoryConnection {
    async fn send(&self, message: MasterMessage) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        tokio::select! {
            _ = self.closed.cancelled() => Err(ConnectionError::Closed),
            result = self.outbound.send(message) => result.map_err(|_| ConnectionError::Closed),
        }
    }

    async fn recv(&self) -> Option<SlaveMessage> {
        let mut inbound = self.inbound.lock().await;

        // Drain what the replica sent before it hung up.
        tokio::select! {
            biased;
            message = inbound.recv() => message,
            _ = self.closed.cancelled() => None,
        }
    }

    async fn close(&self) {
        self.closed.cancel();
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

/// ReplicaEndpoint is the replica's end of a `memory_connection()`. Dropping it closes the
/// connection.
pub struct ReplicaEndpoint {
    outbound: mpsc::Sender<SlaveMessage>,
    inbound: mpsc::Receiver<MasterMessage>,
    closed: CancellationToken,
}

impl ReplicaEndpoint {
    pub async fn send(&self, message: SlaveMessage) -> Result<(), ConnectionError> {
        if self.closed.is_cancelled() {
            return Err(ConnectionError::Closed);
        }

        self.outbound.send(message).await.map_err(|_| ConnectionError::Closed)
    }

    /// Returns buffered messages first, then `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<MasterMessage> {
        tokio::select! {
            biased;
            message = self.inbound.recv() => message,
            _ = self.closed.cancelled() => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    pub fn disconnect(self) {
        // Drop does it.
    }
}

impl Drop for ReplicaEndpoint {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ReplicationTimestamp;
    use tokio::time::Duration;

    #[tokio::test]
    async fn messages_flow_both_ways() {
        let (master_end, mut replica_end) = memory_connection(4);

        replica_end.send(SlaveMessage::Hello).await.unwrap();
        assert_eq!(master_end.recv().await, Some(SlaveMessage::Hello));

        master_end.send(MasterMessage::Hello).await.unwrap();
        assert_eq!(replica_end.recv().await, Some(MasterMessage::Hello));
    }

    #[tokio::test]
    async fn replica_disconnect_drains_then_closes() {
        let (master_end, replica_end) = memory_connection(4);
        let request = SlaveMessage::BackfillRequest {
            since_when: ReplicationTimestamp::new(3),
        };

        replica_end.send(request.clone()).await.unwrap();
        replica_end.disconnect();

        assert_eq!(master_end.recv().await, Some(request));
        assert_eq!(master_end.recv().await, None);
        assert_eq!(
            master_end.send(MasterMessage::Hello).await,
            Err(ConnectionError::Closed)
        );
    }

    #[tokio::test]
    async fn master_close_wakes_pending_recv() {
        let (master_end, mut replica_end) = memory_connection(4);
        let master_end = std::sync::Arc::new(master_end);

        let pending = {
            let master_end = master_end.clone();
            tokio::spawn(async move { master_end.recv().await })
        };
        tokio::task::yield_now().await;
        master_end.close().await;

        let received = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("Unexpected timeout")
            .unwrap();
        assert_eq!(received, None);
        assert_eq!(replica_end.recv().await, None);
        assert!(replica_end.is_closed());
    }
}
