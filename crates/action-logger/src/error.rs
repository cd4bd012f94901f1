//! Logger construction errors
//!
//! Logging, flushing and context gathering never fail from the caller's
//! point of view. The only errors surfaced are the ones that prevent a
//! logger from being built or installed.

use networking::DeliveryError;

/// Errors raised while setting up a logger
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// No queue store was supplied to the builder
    #[error("No queue store configured")]
    MissingStore,

    /// The builder was used outside of a tokio runtime
    #[error("Logger must be built inside a tokio runtime")]
    NoRuntime,

    /// The periodic flush interval must be non-zero
    #[error("Flush interval must be greater than zero")]
    InvalidFlushInterval,

    /// The default HTTP transport could not be created
    #[error("Failed to create transport: {0}")]
    Transport(#[from] DeliveryError),

    /// A process-wide logger has already been installed
    #[error("A process-wide logger is already installed")]
    AlreadyInstalled,
}

/// Result type for logger setup
pub type Result<T> = std::result::Result<T, LoggerError>;
