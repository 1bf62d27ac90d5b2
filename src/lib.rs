//! Botwarden Library
//!
//! Shared-fate supervision for the car bot and its image render server: both
//! children are launched together, and the first exit takes the other one down.

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod signal;
pub mod supervisor;

// Re-export commonly used types for convenience
pub use config::{ChildSpec, SupervisorConfig};
pub use error::{ErrorCategory, WardenError};
pub use supervisor::{supervise, ChildExit, Supervisor, SupervisorState};
