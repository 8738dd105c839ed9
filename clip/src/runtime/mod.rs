//! Runtime integration layer.
//!
//! Isolates the thread-per-loop model used by background consumers so the transports
//! only describe what their loop does, not how it is hosted or stopped.

pub(crate) mod worker_runtime;
