use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// The class of client operation a gate admits.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperationClass {
    Get,
    Set,
}

/// Gate admits one class of client operation. It is open iff at least one `GatePermission` for it
/// is alive.
#[derive(Clone)]
pub struct Gate {
    class: OperationClass,
    open_permissions: Arc<AtomicUsize>,
}

/// GatePermission keeps its gate open for as long as it lives. Dropping it revokes admission.
pub struct GatePermission {
    class: OperationClass,
    open_permissions: Arc<AtomicUsize>,
}

impl Gate {
    pub fn new(class: OperationClass) -> Self {
        Gate {
            class,
            open_permissions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn class(&self) -> OperationClass {
        self.class
    }

    /// Never blocks.
    pub fn acquire(&self) -> GatePermission {
        self.open_permissions.fetch_add(1, Ordering::AcqRel);

        GatePermission {
            class: self.class,
            open_permissions: self.open_permissions.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open_permissions.load(Ordering::Acquire) > 0
    }
}

impl Drop for GatePermission {
    fn drop(&mut self) {
        self.open_permissions.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gate({:?}, open={})", self.class, self.is_open())
    }
}

impl fmt::Debug for GatePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GatePermission({:?})", self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_lifetime_controls_admission() {
        let gate = Gate::new(OperationClass::Set);
        assert!(!gate.is_open());

        let first = gate.acquire();
        let second = gate.clone().acquire();
        assert!(gate.is_open());

        drop(first);
        assert!(gate.is_open(), "One permission is still alive");

        drop(second);
        assert!(!gate.is_open());
    }
}
