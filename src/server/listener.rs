use crate::server::ListenerShutdownSignal;
use crate::{Connection, KeyValueStore, OrderSource, ReplicationMaster};
use std::sync::Arc;
use tokio::sync::mpsc;

/// ConnectionListener hands accepted replica connections to the master, one at a time.
pub struct ConnectionListener<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    logger: slog::Logger,
    master: Arc<ReplicationMaster<S, O>>,
}

impl<S, O> ConnectionListener<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    pub fn new(logger: slog::Logger, master: Arc<ReplicationMaster<S, O>>) -> Self {
        ConnectionListener { logger, master }
    }

    /// Runs until shutdown is signaled or every sender of `incoming` is gone. Connections still
    /// queued at that point are dropped, which closes them.
    pub async fn run<C: Connection>(
        self,
        mut incoming: mpsc::Receiver<C>,
        mut shutdown_signal: ListenerShutdownSignal,
    ) {
        slog::info!(self.logger, "Listening for slave connections.");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown_signal => {
                    slog::info!(self.logger, "Listener shutdown signaled.");
                    break;
                }
                connection = incoming.recv() => match connection {
                    Some(connection) => {
                        let id = self.master.on_conn(connection).await;
                        slog::debug!(self.logger, "Handed {:?} to master.", id);
                    }
                    None => {
                        slog::info!(self.logger, "Connection source closed.");
                        break;
                    }
                },
            }
        }

        slog::info!(self.logger, "Listener run() has exited.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ReplicationOptionsValidated;
    use crate::server::listener_shutdown_signal;
    use crate::test_utils::{test_logger, TestUtilReplica};
    use crate::{memory_connection, Gate, InMemoryStore, MasterMessage, OperationClass, SequentialOrderSource};
    use std::time::Duration;

    fn create_master() -> Arc<ReplicationMaster<InMemoryStore, SequentialOrderSource>> {
        ReplicationMaster::new(
            test_logger(),
            Arc::new(InMemoryStore::new()),
            Arc::new(SequentialOrderSource::new()),
            Gate::new(OperationClass::Get),
            Gate::new(OperationClass::Set),
            ReplicationOptionsValidated::default(),
        )
    }

    #[tokio::test]
    async fn forwards_connections_until_shutdown() {
        let master = create_master();
        let (tx, rx) = mpsc::channel(4);
        let (shutdown_handle, shutdown_signal) = listener_shutdown_signal();
        let listener = tokio::spawn(ConnectionListener::new(test_logger(), master.clone()).run(rx, shutdown_signal));

        let (connection, endpoint) = memory_connection(8);
        assert!(tx.send(connection).await.is_ok());
        let mut replica = TestUtilReplica::new(endpoint);
        assert_eq!(replica.recv().await, MasterMessage::Hello);
        assert!(master.has_slave());

        shutdown_handle.shutdown();
        tokio::time::timeout(Duration::from_secs(5), listener)
            .await
            .expect("Unexpected timeout")
            .unwrap();

        // Shutting down the listener leaves the current slave alone.
        assert!(master.has_slave());
    }

    #[tokio::test]
    async fn exits_when_connection_source_closes() {
        let (tx, rx) = mpsc::channel::<crate::MemoryConnection>(1);
        let (_shutdown_handle, shutdown_signal) = listener_shutdown_signal();
        drop(tx);

        tokio::time::timeout(
            Duration::from_secs(5),
            ConnectionListener::new(test_logger(), create_master()).run(rx, shutdown_signal),
        )
        .await
        .expect("Unexpected timeout");
    }
}
