//! Unified error handling for the route-sentry library.
//!
//! Soft outcomes (a rejected fix, a track too short to save, an out-of-range
//! index) are normal results expressed as `bool`/`Option` and never appear
//! here. This type covers the failures that genuinely stop an operation.

use std::fmt;

/// Unified error type for route-sentry operations.
#[derive(Debug, Clone)]
pub enum SentryError {
    /// The track document could not be read or written.
    Persistence { message: String },
    /// The external routing collaborator is not available.
    ///
    /// This is a precondition violation at the call site; there is no
    /// meaningful degraded operation without a routing engine.
    RoutingUnavailable,
    /// Configuration error
    Config { message: String },
}

impl fmt::Display for SentryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentryError::Persistence { message } => {
                write!(f, "Persistence error: {}", message)
            }
            SentryError::RoutingUnavailable => {
                write!(f, "Routing collaborator is not initialized")
            }
            SentryError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for SentryError {}

/// Result type alias for route-sentry operations.
pub type Result<T> = std::result::Result<T, SentryError>;
