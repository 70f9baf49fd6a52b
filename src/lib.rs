mod api;
mod control;
mod gate;
mod master;
mod order_source;
mod protocol;
mod server;
mod store;
mod stream;
mod sync;
#[cfg(test)]
mod test_utils;

pub use api::try_create_replication_master;
pub use api::PermissionPolicy;
pub use api::ReplicationMasterConfig;
pub use api::ReplicationMasterCreationError;
pub use api::ReplicationOptions;
pub use control::Control;
pub use control::ControlError;
pub use control::Controls;
pub use gate::Gate;
pub use gate::GatePermission;
pub use gate::OperationClass;
pub use master::DontWaitForSlaveOutcome;
pub use master::ReplicationMaster;
pub use master::DONT_WAIT_FOR_SLAVE;
pub use order_source::OrderSource;
pub use order_source::OrderToken;
pub use order_source::SequentialOrderSource;
pub use protocol::CreationTimestamp;
pub use protocol::MasterMessage;
pub use protocol::Record;
pub use protocol::ReplicationTimestamp;
pub use protocol::SlaveMessage;
pub use server::listener_shutdown_signal;
pub use server::ConnectionListener;
pub use server::ListenerShutdownHandle;
pub use server::ListenerShutdownSignal;
pub use store::InMemoryStore;
pub use store::KeyValueStore;
pub use store::StoreError;
pub use store::StoreSnapshot;
pub use store::MAX_KEY_SIZE;
pub use stream::memory_connection;
pub use stream::BackfillSender;
pub use stream::Connection;
pub use stream::ConnectionError;
pub use stream::ConnectionId;
pub use stream::MemoryConnection;
pub use stream::ReplicaEndpoint;
pub use stream::ReplicationReceiver;

// Root modules only declare `mod` and re-export with `pub use`. No `pub mod` anywhere, so each module
// is free to arrange its internals.
