mod signal;

pub(crate) use signal::ResettableSignal;
