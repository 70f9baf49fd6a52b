mod control;

pub use control::Control;
pub use control::ControlError;
pub use control::Controls;
