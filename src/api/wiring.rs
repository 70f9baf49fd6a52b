use crate::api::options::ReplicationOptionsValidated;
use crate::{
    ControlError, Controls, Gate, KeyValueStore, OperationClass, OrderSource, ReplicationMaster, ReplicationOptions,
};
use std::convert::TryFrom;
use std::sync::Arc;

pub struct ReplicationMasterConfig<S, O>
where
    S: KeyValueStore,
    O: OrderSource,
{
    pub info_logger: slog::Logger,
    pub store: Arc<S>,
    pub order_source: Arc<O>,
    // Admission for client reads and writes. The master holds their permissions.
    pub get_gate: Gate,
    pub set_gate: Gate,
    // Where `dont-wait-for-slave` gets registered, if the host has an operator surface.
    pub controls: Option<Arc<Controls>>,
    pub options: ReplicationOptions,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationMasterCreationError {
    #[error("Illegal options for configuring replication master: {0}")]
    IllegalOptions(String),
    #[error("Gate for {expected:?} operations was given a gate for {actual:?} operations")]
    MismatchedGate {
        expected: OperationClass,
        actual: OperationClass,
    },
    #[error("Control registration failure")]
    ControlRegistration(#[from] ControlError),
}

pub fn try_create_replication_master<S, O>(
    config: ReplicationMasterConfig<S, O>,
) -> Result<Arc<ReplicationMaster<S, O>>, ReplicationMasterCreationError>
where
    S: KeyValueStore,
    O: OrderSource,
{
    let options = ReplicationOptionsValidated::try_from(config.options)
        .map_err(|e| ReplicationMasterCreationError::IllegalOptions(e.to_string()))?;

    check_gate(&config.get_gate, OperationClass::Get)?;
    check_gate(&config.set_gate, OperationClass::Set)?;

    let logger = config.info_logger.new(slog::o!("component" => "replication_master"));

    let master = ReplicationMaster::new(
        logger,
        config.store,
        config.order_source,
        config.get_gate,
        config.set_gate,
        options,
    );

    if let Some(controls) = config.controls {
        controls.register(master.dont_wait_for_slave_control())?;
    }

    Ok(master)
}

fn check_gate(gate: &Gate, expected: OperationClass) -> Result<(), ReplicationMasterCreationError> {
    if gate.class() != expected {
        return Err(ReplicationMasterCreationError::MismatchedGate {
            expected,
            actual: gate.class(),
        });
    }

    Ok(())
}
