use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub fn listener_shutdown_signal() -> (ListenerShutdownHandle, ListenerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (ListenerShutdownHandle { tx: Some(tx) }, ListenerShutdownSignal { rx })
}

/// Dropping the handle also stops the listener.
pub struct ListenerShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ListenerShutdownHandle {
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

pub struct ListenerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for ListenerShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let rx = Pin::new(&mut self.rx);

        match rx.poll(cx) {
            Poll::Pending => Poll::Pending,
            // We don't care if oneshot Sender sent value or dropped
            Poll::Ready(_) => Poll::Ready(()),
        }
    }
}
