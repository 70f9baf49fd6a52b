mod connection;
mod roles;
mod stream;

pub use connection::memory_connection;
pub use connection::Connection;
pub use connection::ConnectionError;
pub use connection::MemoryConnection;
pub use connection::ReplicaEndpoint;
pub use roles::BackfillSender;
pub use roles::ReplicationReceiver;
pub use stream::ConnectionId;

pub(crate) use stream::ReplicationStream;
pub(crate) use stream::StreamSender;
