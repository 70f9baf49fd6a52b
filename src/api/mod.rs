//! This mod is meant to hold most of the code for the library's client-facing API.
mod options;
mod wiring;

pub use options::PermissionPolicy;
pub use options::ReplicationOptions;
pub use wiring::try_create_replication_master;
pub use wiring::ReplicationMasterConfig;
pub use wiring::ReplicationMasterCreationError;

// So the master can read validated options.
pub(crate) use options::ReplicationOptionsValidated;
