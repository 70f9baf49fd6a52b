use tokio::sync::watch;

/// ResettableSignal is a level-triggered, broadcastable flag. Any number of tasks may wait for it
/// to become signaled; it stays signaled until someone resets it.
pub struct ResettableSignal {
    snd: watch::Sender<bool>,
}

impl ResettableSignal {
    pub fn new(initially_signaled: bool) -> Self {
        let (snd, _) = watch::channel(initially_signaled);

        ResettableSignal { snd }
    }

    pub fn pulse(&self) {
        self.snd.send_replace(true);
    }

    pub fn reset(&self) {
        self.snd.send_replace(false);
    }

    pub fn is_pulsed(&self) -> bool {
        *self.snd.borrow()
    }

    /// `wait()` returns once the signal is pulsed. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rcv = self.snd.subscribe();
        // The sender lives in `self`, so the channel can't close while we borrow it.
        let _ = rcv.wait_for(|pulsed| *pulsed).await;
    }
}
