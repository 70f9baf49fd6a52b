mod listener;
mod shutdown;

pub use listener::ConnectionListener;
pub use shutdown::listener_shutdown_signal;
pub use shutdown::ListenerShutdownHandle;
pub use shutdown::ListenerShutdownSignal;
