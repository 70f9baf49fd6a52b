use bytes::Bytes;
use std::fmt;

/// ReplicationTimestamp is the store's logical replication clock. Backfill requests, time barriers
/// and every record carry one.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ReplicationTimestamp(u32);

impl ReplicationTimestamp {
    pub const DISTANT_PAST: ReplicationTimestamp = ReplicationTimestamp(0);

    pub fn new(timestamp: u32) -> Self {
        ReplicationTimestamp(timestamp)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ReplicationTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CreationTimestamp identifies a database instance by when it was created. A replica introduces
/// itself with it. Zero means "no replica".
#[derive(Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct CreationTimestamp(u32);

impl CreationTimestamp {
    pub const NONE: CreationTimestamp = CreationTimestamp(0);

    pub fn new(timestamp: u32) -> Self {
        CreationTimestamp(timestamp)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for CreationTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record is one key's state at `timestamp`. A `None` value is a deletion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub key: Bytes,
    pub value: Option<Bytes>,
    pub timestamp: ReplicationTimestamp,
}

impl Record {
    pub fn set(key: impl Into<Bytes>, value: impl Into<Bytes>, timestamp: ReplicationTimestamp) -> Self {
        Record {
            key: key.into(),
            value: Some(value.into()),
            timestamp,
        }
    }

    pub fn delete(key: impl Into<Bytes>, timestamp: ReplicationTimestamp) -> Self {
        Record {
            key: key.into(),
            value: None,
            timestamp,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.value.is_none()
    }
}
