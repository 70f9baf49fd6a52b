use crate::api::{PermissionPolicy, ReplicationOptionsValidated};
use crate::gate::{Gate, GatePermission};
use crate::master::backfill_storer::BackfillStorer;
use crate::master::control::{DontWaitForSlaveControl, DontWaitForSlaveOutcome};
use crate::master::streaming;
use crate::order_source::OrderSource;
use crate::protocol::{CreationTimestamp, MasterMessage, Record, ReplicationTimestamp};
use crate::store::KeyValueStore;
use crate::stream::{
    BackfillSender, Connection, ConnectionError, ConnectionId, ReplicationReceiver, ReplicationStream, StreamSender,
};
use crate::sync::ResettableSignal;
use crate::Control;
#[cfg(debug_assertions)]
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// ReplicationMaster manages the connection to a slave.
///
/// It owns at most one replica connection at a time; a newer connection always supersedes an older
/// one. On the slave's request it runs a single backfill-and-realtime-stream task against that
/// connection, and it holds the permissions that let client gets and sets through their gates.
pub struct ReplicationMaster<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    logger: slog::Logger,
    myself: Weak<Self>,
    store: Arc<S>,
    order_source: Arc<O>,
    get_gate: Gate,
    set_gate: Gate,
    options: ReplicationOptionsValidated,

    // For reverse backfilling.
    backfill_storer: BackfillStorer<S, O>,

    // Never held across an await.
    state: Mutex<LinkState>,

    // Unpulsed iff `state.stream` is Some.
    stream_exists: ResettableSignal,
    // Unpulsed iff a backfill/stream task is registered in `state.streaming`.
    streaming_active: ResettableSignal,

    // Every assignment and destruction of `state.stream` happens while holding this.
    setup_teardown: tokio::sync::Mutex<()>,
    // Held by the running backfill/stream task for its whole life.
    streaming_slot: tokio::sync::Mutex<()>,

    next_connection_id: AtomicU64,
    next_task_id: AtomicU64,

    // Backfill/stream tasks spawned and not yet exited.
    #[cfg(debug_assertions)]
    outstanding_tasks: AtomicUsize,
    // Tasks currently holding `streaming_slot`. Never above one.
    #[cfg(debug_assertions)]
    running_tasks: AtomicUsize,
}

struct LinkState {
    stream: Option<ReplicationStream>,
    streaming: Option<StreamingTask>,
    get_permission: Option<GatePermission>,
    set_permission: Option<GatePermission>,
}

struct StreamingTask {
    task_id: u64,
    connection: ConnectionId,
    // Fresh for every task, never reused.
    interrupt: CancellationToken,
    handle: JoinHandle<()>,
}

impl<S, O> ReplicationMaster<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    pub(crate) fn new(
        logger: slog::Logger,
        store: Arc<S>,
        order_source: Arc<O>,
        get_gate: Gate,
        set_gate: Gate,
        options: ReplicationOptionsValidated,
    ) -> Arc<Self> {
        let backfill_storer = BackfillStorer::new(
            logger.new(slog::o!("component" => "backfill_storer")),
            store.clone(),
            order_source.clone(),
        );

        let mut state = LinkState {
            stream: None,
            streaming: None,
            get_permission: None,
            set_permission: None,
        };
        if !options.wait_for_slave {
            // Nothing is connected yet, so there is nothing to wait for.
            state.get_permission = Some(get_gate.acquire());
            state.set_permission = Some(set_gate.acquire());
            slog::info!(logger, "Accepting operations at startup without waiting for a slave.");
        }

        Arc::new_cyclic(|myself| ReplicationMaster {
            logger,
            myself: myself.clone(),
            store,
            order_source,
            get_gate,
            set_gate,
            options,
            backfill_storer,
            state: Mutex::new(state),
            stream_exists: ResettableSignal::new(true),
            streaming_active: ResettableSignal::new(true),
            setup_teardown: tokio::sync::Mutex::new(()),
            streaming_slot: tokio::sync::Mutex::new(()),
            next_connection_id: AtomicU64::new(1),
            next_task_id: AtomicU64::new(1),
            #[cfg(debug_assertions)]
            outstanding_tasks: AtomicUsize::new(0),
            #[cfg(debug_assertions)]
            running_tasks: AtomicUsize::new(0),
        })
    }

    pub fn has_slave(&self) -> bool {
        self.lock_state().stream.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        !self.streaming_active.is_pulsed()
    }

    pub fn is_accepting_operations(&self) -> bool {
        self.lock_state().get_permission.is_some()
    }

    pub fn is_reverse_backfilling(&self) -> bool {
        self.backfill_storer.is_active()
    }

    /// Creation timestamp of the replica associated with this master.
    pub fn slave_identity(&self) -> CreationTimestamp {
        self.store.replication_slave_id()
    }

    pub async fn wait_for_no_slave(&self) {
        self.stream_exists.wait().await;
    }

    pub async fn wait_for_streaming_to_stop(&self) {
        self.streaming_active.wait().await;
    }

    /// The `dont-wait-for-slave` administrative control, to be registered with a `Controls`.
    pub fn dont_wait_for_slave_control(&self) -> Arc<dyn Control> {
        Arc::new(DontWaitForSlaveControl::new(self.myself.clone()))
    }

    /// Install a freshly accepted connection as the slave connection, tearing down the previous one
    /// first.
    pub async fn on_conn<C: Connection>(&self, connection: C) -> ConnectionId {
        let setup_teardown = self.setup_teardown.lock().await;
        self.destroy_existing_slave_conn_if_it_exists(&setup_teardown).await;

        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let logger = self.logger.new(slog::o!("connection" => id.as_u64()));
        let connection: Arc<dyn Connection> = Arc::new(connection);

        // Greet before anything else can be sent on it.
        if connection.send(MasterMessage::Hello).await.is_err() {
            slog::debug!(logger, "Slave hung up before hello.");
        }

        let receiver: Weak<dyn ReplicationReceiver> = self.myself.clone();
        let stream = ReplicationStream::start(logger.clone(), id, connection, receiver);
        {
            let mut state = self.lock_state();
            state.stream = Some(stream);
            self.stream_exists.reset();
            self.debug_check_stream_exists(&state);
        }

        slog::info!(logger, "Slave connected.");
        id
    }

    /// Master shutdown. Tears down the slave connection, if any, and waits for the backfill/stream
    /// task to exit.
    pub async fn shutdown(&self) {
        {
            let setup_teardown = self.setup_teardown.lock().await;
            self.destroy_existing_slave_conn_if_it_exists(&setup_teardown).await;
        }

        // Teardown interrupted it, if there was one.
        let task = self.lock_state().streaming.take();
        if let Some(task) = task {
            if let Err(e) = task.handle.await {
                slog::warn!(self.logger, "Backfill/stream task failed: {}", e; "task" => task.task_id);
            }

            // The task found the slot empty on exit, so it left the signal to us.
            let state = self.lock_state();
            if state.streaming.is_none() {
                self.streaming_active.pulse();
            }
        }

        self.streaming_active.wait().await;
    }

    pub fn dont_wait_for_slave(&self) -> DontWaitForSlaveOutcome {
        let mut state = self.lock_state();

        if state.get_permission.is_some() {
            return DontWaitForSlaveOutcome::AlreadyAccepting;
        }
        if state.stream.is_some() {
            return DontWaitForSlaveOutcome::RefusedWhileReverseBackfilling;
        }

        state.get_permission = Some(self.get_gate.acquire());
        state.set_permission = Some(self.set_gate.acquire());
        slog::info!(
            self.logger,
            "Now accepting operations even though no slave connected because \"dont-wait-for-slave\" was run."
        );

        DontWaitForSlaveOutcome::NowAccepting
    }

    async fn handle_conn_closed(&self, connection: ConnectionId) {
        let setup_teardown = self.setup_teardown.lock().await;

        let current = self.lock_state().stream.as_ref().map(|stream| stream.id());
        if current != Some(connection) {
            // Already torn down when a newer connection superseded it.
            slog::debug!(self.logger, "Ignoring closure of {:?}; current is {:?}.", connection, current);
            return;
        }

        self.destroy_existing_slave_conn_if_it_exists(&setup_teardown).await;
    }

    async fn destroy_existing_slave_conn_if_it_exists(&self, _setup_teardown: &tokio::sync::MutexGuard<'_, ()>) {
        // Move the stream out of the shared field first. Its shutdown may block, and nobody may
        // find a half torn down stream through `state`. The task is interrupted before that, since
        // closing may wait for its sends to drain.
        let stream = {
            let mut state = self.lock_state();
            let stream = match state.stream.take() {
                Some(stream) => stream,
                None => return,
            };

            if let Some(task) = &state.streaming {
                if !task.interrupt.is_cancelled() {
                    self.debug_check_task_outstanding();
                    task.interrupt.cancel();
                }
            }

            stream
        };
        let id = stream.id();

        stream.shutdown().await;

        {
            let state = self.lock_state();
            self.stream_exists.pulse();
            self.debug_check_stream_exists(&state);
        }

        self.backfill_storer.connection_lost();
        self.order_source.backfill_done();

        slog::info!(self.logger, "Connection to slave was closed."; "connection" => id.as_u64());
    }

    fn start_backfill_and_realtime_stream(&self, connection: ConnectionId, since_when: ReplicationTimestamp) {
        let myself = match self.myself.upgrade() {
            Some(myself) => myself,
            None => return,
        };

        let mut state = self.lock_state();

        let sender = match &state.stream {
            Some(stream) if stream.id() == connection => stream.sender(),
            _ => {
                slog::debug!(self.logger, "Ignoring backfill request from superseded {:?}.", connection);
                return;
            }
        };

        if let Some(task) = &state.streaming {
            if task.connection == connection && !task.interrupt.is_cancelled() {
                slog::warn!(
                    self.logger,
                    "Slave asked for another backfill while one is running. Ignoring it.";
                    "connection" => connection.as_u64(),
                    "since_when" => since_when.as_u32(),
                );
                return;
            }
        }

        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        let interrupt = CancellationToken::new();
        #[cfg(debug_assertions)]
        self.outstanding_tasks.fetch_add(1, Ordering::SeqCst);

        let handle = tokio::spawn(myself.do_backfill_and_realtime_stream(
            task_id,
            connection,
            sender,
            since_when,
            interrupt.clone(),
        ));

        // A task still in the slot belongs to a torn down connection and has been interrupted.
        // It clears nothing when it exits because its id no longer matches.
        state.streaming = Some(StreamingTask {
            task_id,
            connection,
            interrupt,
            handle,
        });
        self.streaming_active.reset();
    }

    async fn do_backfill_and_realtime_stream(
        self: Arc<Self>,
        task_id: u64,
        connection: ConnectionId,
        sender: StreamSender,
        since_when: ReplicationTimestamp,
        interrupt: CancellationToken,
    ) {
        let logger = self
            .logger
            .new(slog::o!("connection" => connection.as_u64(), "task" => task_id));

        // A task from an earlier connection may still be unwinding.
        let streaming_slot = self.streaming_slot.lock().await;

        #[cfg(debug_assertions)]
        assert_eq!(
            self.running_tasks.fetch_add(1, Ordering::SeqCst),
            0,
            "Two backfill/stream tasks running at once"
        );

        if interrupt.is_cancelled() {
            slog::debug!(logger, "Interrupted before it started.");
        } else {
            let outcome = streaming::backfill_and_realtime_stream(
                &logger,
                &sender,
                self.store.as_ref(),
                since_when,
                self.options.backfill_chunk_size,
                &interrupt,
            )
            .await;
            slog::info!(logger, "Backfill/realtime stream ended: {:?}", outcome);

            if outcome.is_io_failure() {
                self.handle_conn_closed(connection).await;
            }
        }

        {
            // A successor registered in the meantime keeps the signal reset.
            let mut state = self.lock_state();
            if matches!(&state.streaming, Some(task) if task.task_id == task_id) {
                state.streaming = None;
                self.streaming_active.pulse();
            }
        }
        #[cfg(debug_assertions)]
        {
            self.running_tasks.fetch_sub(1, Ordering::SeqCst);
            self.outstanding_tasks.fetch_sub(1, Ordering::SeqCst);
        }

        drop(streaming_slot);
    }

    fn revoke_permissions(&self, reason: &str) {
        let mut state = self.lock_state();
        if state.get_permission.is_none() && state.set_permission.is_none() {
            return;
        }

        state.get_permission = None;
        state.set_permission = None;
        slog::warn!(self.logger, "No longer accepting operations: {}.", reason);
    }

    fn lock_state(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().expect("ReplicationMaster state mutex guard poison")
    }

    fn debug_check_stream_exists(&self, state: &LinkState) {
        debug_assert_eq!(
            state.stream.is_some(),
            !self.stream_exists.is_pulsed(),
            "stream_exists must be unpulsed exactly while a stream is installed"
        );
    }

    #[cfg(debug_assertions)]
    fn debug_check_task_outstanding(&self) {
        assert!(
            self.outstanding_tasks.load(Ordering::SeqCst) > 0,
            "Interrupting a backfill/stream task while none is in flight"
        );
    }

    #[cfg(not(debug_assertions))]
    fn debug_check_task_outstanding(&self) {}
}

#[async_trait::async_trait]
impl<S, O> ReplicationReceiver for ReplicationMaster<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    async fn hello(&self) {
        slog::debug!(self.logger, "Received hello from slave.");
    }

    async fn introduce(&self, database_creation_timestamp: CreationTimestamp) {
        let previous_slave = self.store.replication_slave_id();
        if !previous_slave.is_none() && previous_slave != database_creation_timestamp {
            slog::warn!(
                self.logger,
                "The slave that was previously associated with this master is now being forgotten; you will not \
                 be able to reconnect it later.";
                "previous_slave" => previous_slave.as_u32(),
                "new_slave" => database_creation_timestamp.as_u32(),
            );
        }

        self.store.set_replication_slave_id(database_creation_timestamp);
    }

    async fn backfill(&self, connection: ConnectionId, since_when: ReplicationTimestamp) {
        self.start_backfill_and_realtime_stream(connection, since_when);
    }

    async fn time_barrier(&self, timestamp: ReplicationTimestamp) {
        self.backfill_storer.time_barrier(timestamp);
    }

    async fn reverse_backfill_record(&self, record: Record) {
        let stored = self.backfill_storer.store_record(record);

        if stored.opened_window && self.options.permission_policy == PermissionPolicy::RevokeOnReverseBackfill {
            self.revoke_permissions("slave started reverse backfilling");
        }

        if stored.result.is_err() && self.is_accepting_operations() {
            slog::warn!(
                self.logger,
                "Serving operations although some of the slave's data could not be applied."
            );
        }
    }

    async fn reverse_backfill_done(&self, timestamp: ReplicationTimestamp) {
        self.backfill_storer.backfill_done(timestamp);
    }

    async fn conn_closed(&self, connection: ConnectionId) {
        self.handle_conn_closed(connection).await;
    }
}

#[async_trait::async_trait]
impl<S, O> BackfillSender for ReplicationMaster<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    /// Send to whichever slave is connected right now.
    async fn send(&self, message: MasterMessage) -> Result<(), ConnectionError> {
        let sender = self.lock_state().stream.as_ref().map(|stream| stream.sender());

        match sender {
            Some(sender) => sender.send(message).await,
            None => Err(ConnectionError::Closed),
        }
    }
}
