mod backfill_storer;
mod control;
mod master;
mod streaming;

pub use control::DontWaitForSlaveOutcome;
pub use control::DONT_WAIT_FOR_SLAVE;
pub use master::ReplicationMaster;
