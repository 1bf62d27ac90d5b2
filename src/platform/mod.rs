//! Platform process primitives: process-group launch, liveness probes, and
//! graceful-then-forceful termination.

mod unix;

pub use unix::{prepare_command, process_alive, terminate_process};
