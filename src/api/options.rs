use std::convert::TryFrom;

/// What happens to permissions the master already holds when a replica starts reverse-backfilling
/// into it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PermissionPolicy {
    /// Keep admitting operations. Whoever ran `dont-wait-for-slave` vouched for the data.
    Retain,
    /// Close both gates as soon as the first reverse-backfill record arrives.
    RevokeOnReverseBackfill,
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        PermissionPolicy::Retain
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReplicationOptions {
    /// Number of backfill records sent between two checks for interruption.
    pub backfill_chunk_size: Option<usize>,
    /// When false, the master opens both gates at startup instead of waiting for a replica.
    pub wait_for_slave: Option<bool>,
    pub permission_policy: Option<PermissionPolicy>,
}

#[derive(Clone, Debug)]
pub(crate) struct ReplicationOptionsValidated {
    pub(crate) backfill_chunk_size: usize,
    pub(crate) wait_for_slave: bool,
    pub(crate) permission_policy: PermissionPolicy,
}

impl ReplicationOptionsValidated {
    fn validate(&self) -> Result<(), &'static str> {
        if self.backfill_chunk_size == 0 {
            return Err("Backfill chunk size must be greater than zero");
        }

        Ok(())
    }
}

impl Default for ReplicationOptionsValidated {
    fn default() -> Self {
        ReplicationOptionsValidated {
            backfill_chunk_size: 64,
            wait_for_slave: true,
            permission_policy: PermissionPolicy::Retain,
        }
    }
}

impl TryFrom<ReplicationOptions> for ReplicationOptionsValidated {
    type Error = &'static str;

    fn try_from(options: ReplicationOptions) -> Result<Self, Self::Error> {
        let defaults = ReplicationOptionsValidated::default();
        let values = ReplicationOptionsValidated {
            backfill_chunk_size: options.backfill_chunk_size.unwrap_or(defaults.backfill_chunk_size),
            wait_for_slave: options.wait_for_slave.unwrap_or(defaults.wait_for_slave),
            permission_policy: options.permission_policy.unwrap_or(defaults.permission_policy),
        };

        values.validate()?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_filled_in() {
        let validated = ReplicationOptionsValidated::try_from(ReplicationOptions::default()).unwrap();

        assert_eq!(validated.backfill_chunk_size, 64);
        assert!(validated.wait_for_slave);
        assert_eq!(validated.permission_policy, PermissionPolicy::Retain);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let options = ReplicationOptions {
            backfill_chunk_size: Some(0),
            ..ReplicationOptions::default()
        };

        assert!(ReplicationOptionsValidated::try_from(options).is_err());
    }
}
