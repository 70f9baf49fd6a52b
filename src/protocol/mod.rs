mod messages;
mod types;

pub use messages::MasterMessage;
pub use messages::SlaveMessage;
pub use types::CreationTimestamp;
pub use types::Record;
pub use types::ReplicationTimestamp;
