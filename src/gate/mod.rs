mod gate;

pub use gate::Gate;
pub use gate::GatePermission;
pub use gate::OperationClass;
