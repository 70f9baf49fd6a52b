use crate::master::master::ReplicationMaster;
use crate::order_source::OrderSource;
use crate::store::KeyValueStore;
use crate::Control;
use std::sync::Weak;

pub const DONT_WAIT_FOR_SLAVE: &str = "dont-wait-for-slave";

const HELP: &str = "Make the master accept operations even though no slave has connected yet. Only use this if \
                    no slave was connected when the master last shut down. If the slave had data the master \
                    lacked, running this will lose that data.";

/// What happened when an operator asked the master to stop waiting for a slave.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DontWaitForSlaveOutcome {
    NowAccepting,
    RefusedWhileReverseBackfilling,
    AlreadyAccepting,
}

impl DontWaitForSlaveOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            DontWaitForSlaveOutcome::NowAccepting => {
                "Master will now accept operations even though no slave has connected yet."
            }
            DontWaitForSlaveOutcome::RefusedWhileReverseBackfilling => {
                "The master cannot accept operations because it is reverse-backfilling from the slave right now, \
                 so its data is in an inconsistent state. The master will accept operations once it is done \
                 reverse-backfilling."
            }
            DontWaitForSlaveOutcome::AlreadyAccepting => "The master is already accepting operations.",
        }
    }
}

pub(crate) struct DontWaitForSlaveControl<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    master: Weak<ReplicationMaster<S, O>>,
}

impl<S, O> DontWaitForSlaveControl<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    pub(crate) fn new(master: Weak<ReplicationMaster<S, O>>) -> Self {
        DontWaitForSlaveControl { master }
    }
}

impl<S, O> Control for DontWaitForSlaveControl<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    fn name(&self) -> &str {
        DONT_WAIT_FOR_SLAVE
    }

    fn help(&self) -> &str {
        HELP
    }

    fn call(&self, args: &[&str]) -> String {
        if !args.is_empty() {
            return format!("\"{}\" doesn't expect any arguments.", DONT_WAIT_FOR_SLAVE);
        }

        match self.master.upgrade() {
            Some(master) => master.dont_wait_for_slave().message().to_string(),
            None => String::from("The master has shut down."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ReplicationOptionsValidated;
    use crate::order_source::SequentialOrderSource;
    use crate::store::InMemoryStore;
    use crate::stream::memory_connection;
    use crate::test_utils::test_logger;
    use crate::{Controls, Gate, OperationClass};
    use std::sync::Arc;

    fn create_master() -> (Arc<ReplicationMaster<InMemoryStore, SequentialOrderSource>>, Gate) {
        let get_gate = Gate::new(OperationClass::Get);
        let master = ReplicationMaster::new(
            test_logger(),
            Arc::new(InMemoryStore::new()),
            Arc::new(SequentialOrderSource::new()),
            get_gate.clone(),
            Gate::new(OperationClass::Set),
            ReplicationOptionsValidated::default(),
        );

        (master, get_gate)
    }

    #[tokio::test]
    async fn control_runs_override() {
        let (master, get_gate) = create_master();
        let controls = Controls::new();
        controls.register(master.dont_wait_for_slave_control()).unwrap();

        assert_eq!(
            controls.execute("dont-wait-for-slave"),
            DontWaitForSlaveOutcome::NowAccepting.message()
        );
        assert!(get_gate.is_open());
        assert_eq!(
            controls.execute("dont-wait-for-slave"),
            DontWaitForSlaveOutcome::AlreadyAccepting.message()
        );
    }

    #[tokio::test]
    async fn control_rejects_arguments() {
        let (master, get_gate) = create_master();
        let control = master.dont_wait_for_slave_control();

        assert_eq!(
            control.call(&["now"]),
            "\"dont-wait-for-slave\" doesn't expect any arguments."
        );
        assert!(!get_gate.is_open());
    }

    #[tokio::test]
    async fn control_refuses_while_slave_connected() {
        let (master, get_gate) = create_master();
        let (connection, _endpoint) = memory_connection(8);
        master.on_conn(connection).await;

        let response = master.dont_wait_for_slave_control().call(&[]);
        assert_eq!(response, DontWaitForSlaveOutcome::RefusedWhileReverseBackfilling.message());
        assert!(!get_gate.is_open());
    }

    #[tokio::test]
    async fn control_outlives_master() {
        let (master, _) = create_master();
        let control = master.dont_wait_for_slave_control();
        drop(master);

        assert_eq!(control.call(&[]), "The master has shut down.");
    }

    #[test]
    fn help_warns_about_data_loss() {
        let (master, _) = create_master();
        let control = master.dont_wait_for_slave_control();

        assert_eq!(control.name(), DONT_WAIT_FOR_SLAVE);
        assert!(control.help().contains("lose"));
    }
}
