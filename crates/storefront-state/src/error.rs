//! # State Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      State Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────────┐  ┌─────────────────┐  ┌────────────────────┐  │
//! │  │  Invocation         │  │  Cancelled      │  │  Precondition      │  │
//! │  │                     │  │                 │  │                    │  │
//! │  │  wrapped call       │  │  teardown hit   │  │  caller misuse:    │  │
//! │  │  rejected (also the │  │  during a retry │  │  load_next with no │  │
//! │  │  exhausted-retry    │  │  backoff        │  │  next page, page 0 │  │
//! │  │  payload)           │  │                 │  │                    │  │
//! │  └─────────────────────┘  └─────────────────┘  └────────────────────┘  │
//! │        ▲ stored in AsyncState.error            ▲ returned only, never  │
//! │        │ AND returned to the awaiting caller   │ stored in state       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use thiserror::Error;

/// Result type alias for async state operations.
pub type OperationResult<T> = Result<T, OperationError>;

/// Failure of an async operation.
///
/// `Clone` so the last error can live inside watched state and be handed
/// to every subscriber.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// The wrapped call failed. Carries the original message.
    #[error("{message}")]
    Invocation { message: String },

    /// The owning scope was torn down while a retry was scheduled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The caller asked for something the current state can't provide.
    #[error("Precondition violated: {0}")]
    Precondition(String),
}

impl OperationError {
    /// Normalizes any displayable failure into an invocation error.
    pub fn invocation<E: fmt::Display>(err: E) -> Self {
        OperationError::Invocation {
            message: err.to_string(),
        }
    }

    pub fn precondition(reason: impl Into<String>) -> Self {
        OperationError::Precondition(reason.into())
    }

    /// Returns true for caller-misuse errors.
    pub fn is_precondition(&self) -> bool {
        matches!(self, OperationError::Precondition(_))
    }
}

impl From<storefront_core::PricingError> for OperationError {
    fn from(err: storefront_core::PricingError) -> Self {
        OperationError::Precondition(err.to_string())
    }
}

impl From<storefront_core::CoreError> for OperationError {
    fn from(err: storefront_core::CoreError) -> Self {
        OperationError::Precondition(err.to_string())
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Configuration load/save failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_keeps_message() {
        let err = OperationError::invocation("network down");
        assert_eq!(err.to_string(), "network down");
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_invocation_from_std_error() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        assert_eq!(
            OperationError::invocation(io),
            OperationError::Invocation {
                message: "timed out".to_string()
            }
        );
    }

    #[test]
    fn test_core_errors_are_preconditions() {
        let err: OperationError = storefront_core::PricingError::MixedCurrency {
            first: "USD".into(),
            second: "EUR".into(),
        }
        .into();
        assert!(err.is_precondition());
    }
}
