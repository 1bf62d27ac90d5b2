//! Unified error handling for botwarden
//!
//! Every fatal condition funnels into [`WardenError`]; termination failures
//! while stopping a child that may already be gone are swallowed inside the
//! platform layer and never reach this type.

use std::fmt;
use std::io;
use thiserror::Error;

/// Main error type for the supervisor
#[derive(Error, Debug)]
pub enum WardenError {
    /// Required environment configuration is missing or invalid
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A child process could not be started
    #[error("Launch error ({child}): {message}")]
    Launch {
        child: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Plumbing failures (signal handler install, pid bookkeeping)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Launch,
    Io,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Launch => "launch",
            ErrorCategory::Io => "io",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl WardenError {
    pub fn config(message: impl Into<String>) -> Self {
        WardenError::Config {
            message: message.into(),
        }
    }

    pub fn launch(
        child: impl Into<String>,
        message: impl Into<String>,
        source: Option<io::Error>,
    ) -> Self {
        WardenError::Launch {
            child: child.into(),
            message: message.into(),
            source: source.map(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            WardenError::Config { .. } => ErrorCategory::Config,
            WardenError::Launch { .. } => ErrorCategory::Launch,
            WardenError::Io(..) => ErrorCategory::Io,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            WardenError::Config { message } => {
                format!("Configuration problem: {}", message)
            }
            WardenError::Launch { child, message, .. } => {
                format!("Could not start {}: {}", child, message)
            }
            WardenError::Io(err) => {
                format!("Supervisor internals failed: {}", err)
            }
        }
    }
}
