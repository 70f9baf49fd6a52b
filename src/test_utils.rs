use crate::protocol::MasterMessage;
use crate::stream::ReplicaEndpoint;
use std::fmt::Debug;
use std::time::Duration;
use tokio::sync::mpsc;

pub(crate) fn test_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

pub(crate) struct TestUtilReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Debug> TestUtilReceiver<T> {
    pub(crate) fn new_unbounded(rx: mpsc::UnboundedReceiver<T>) -> Self {
        TestUtilReceiver { rx }
    }

    pub(crate) async fn recv(&mut self) -> T {
        self.recv_with_sanity_timeout().await.expect("Expected value")
    }

    async fn recv_with_sanity_timeout(&mut self) -> Option<T> {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("Unexpected timeout")
    }

    pub(crate) async fn recv_assert_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .expect_err("Expected timeout");
    }
}

/// TestUtilReplica plays the replica side of a memory connection.
pub(crate) struct TestUtilReplica {
    endpoint: ReplicaEndpoint,
    timeout: Duration,
}

impl TestUtilReplica {
    pub(crate) fn new(endpoint: ReplicaEndpoint) -> Self {
        TestUtilReplica {
            endpoint,
            timeout: Duration::from_millis(10),
        }
    }

    pub(crate) fn endpoint(&self) -> &ReplicaEndpoint {
        &self.endpoint
    }

    pub(crate) async fn recv(&mut self) -> MasterMessage {
        tokio::time::timeout(Duration::from_secs(5), self.endpoint.recv())
            .await
            .expect("Unexpected timeout")
            .expect("Connection closed")
    }

    pub(crate) async fn assert_no_message(&mut self) {
        tokio::time::timeout(self.timeout, self.endpoint.recv())
            .await
            .expect_err("Expected timeout");
    }

    pub(crate) async fn assert_closed(&mut self) {
        let message = tokio::time::timeout(Duration::from_secs(5), self.endpoint.recv())
            .await
            .expect("Unexpected timeout");
        assert_eq!(message, None);
    }

    pub(crate) fn disconnect(self) {
        self.endpoint.disconnect();
    }
}

/// Poll `condition` until it holds, panicking after a sanity timeout.
pub(crate) async fn eventually<F: Fn() -> bool>(condition: F) {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    };

    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .expect("Condition never became true");
}
