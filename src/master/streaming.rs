use crate::protocol::{MasterMessage, ReplicationTimestamp};
use crate::store::KeyValueStore;
use crate::stream::BackfillSender;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// How a backfill-and-realtime-stream task ended. There is no "completed": the realtime phase only
/// ends when something stops it.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum StreamingOutcome {
    Interrupted,
    // The connection broke under us.
    SenderClosed,
    // The replica fell so far behind that live writes were dropped. It has to backfill again.
    RealtimeLagged(u64),
    StoreClosed,
}

impl StreamingOutcome {
    /// True if the connection can't be trusted any more and has to be torn down.
    pub(crate) fn is_io_failure(&self) -> bool {
        matches!(self, StreamingOutcome::SenderClosed | StreamingOutcome::RealtimeLagged(_))
    }
}

/// Send everything `store` has changed since `since_when`, then forward live writes until
/// `interrupt` fires. `interrupt` is checked at every chunk boundary and raced against every send
/// and every wait for a live write.
pub(crate) async fn backfill_and_realtime_stream<Snd, S>(
    logger: &slog::Logger,
    sender: &Snd,
    store: &S,
    since_when: ReplicationTimestamp,
    chunk_size: usize,
    interrupt: &CancellationToken,
) -> StreamingOutcome
where
    Snd: BackfillSender + ?Sized,
    S: KeyValueStore,
{
    let mut snapshot = store.snapshot_since(since_when);
    slog::info!(
        logger,
        "Backfilling {} records changed since {:?}.",
        snapshot.records.len(),
        since_when
    );

    // -- backfill --
    for chunk in snapshot.records.chunks(chunk_size) {
        if interrupt.is_cancelled() {
            return StreamingOutcome::Interrupted;
        }

        for record in chunk {
            let message = MasterMessage::BackfillRecord(record.clone());
            if let Err(outcome) = send_or_interrupt(sender, message, interrupt).await {
                return outcome;
            }
        }

        tokio::task::yield_now().await;
    }

    let backfill_done = MasterMessage::BackfillDone {
        timestamp: snapshot.timestamp,
    };
    if let Err(outcome) = send_or_interrupt(sender, backfill_done, interrupt).await {
        return outcome;
    }
    slog::info!(logger, "Backfill done at {:?}. Streaming realtime.", snapshot.timestamp);

    // -- realtime --
    loop {
        let received = tokio::select! {
            biased;
            _ = interrupt.cancelled() => return StreamingOutcome::Interrupted,
            received = snapshot.realtime.recv() => received,
        };

        match received {
            Ok(record) => {
                if let Err(outcome) = send_or_interrupt(sender, MasterMessage::Realtime(record), interrupt).await {
                    return outcome;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                slog::warn!(logger, "Slave lagged by {} realtime writes.", skipped);
                return StreamingOutcome::RealtimeLagged(skipped);
            }
            Err(RecvError::Closed) => return StreamingOutcome::StoreClosed,
        }
    }
}

async fn send_or_interrupt<Snd>(
    sender: &Snd,
    message: MasterMessage,
    interrupt: &CancellationToken,
) -> Result<(), StreamingOutcome>
where
    Snd: BackfillSender + ?Sized,
{
    tokio::select! {
        biased;
        _ = interrupt.cancelled() => Err(StreamingOutcome::Interrupted),
        result = sender.send(message) => result.map_err(|_| StreamingOutcome::SenderClosed),
    }
}
