//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Cart boundary violations                       │
//! │  ├── PricingError     - Aggregator precondition violations             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-state errors (separate crate)                              │
//! │  └── OperationError   - Async invocation / retry / paging failures     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError / PricingError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is a *precondition violation*: the caller handed us
//! input it should have rejected earlier. None of them is a runtime failure
//! worth retrying.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Cart boundary errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Product is not present in the cart.
    #[error("Product {0} not in cart")]
    NotInCart(String),

    /// Cart has reached its distinct line limit.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Merged quantity would exceed the per-line maximum.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A line item in a different currency than the rest of the cart.
    ///
    /// ## When This Occurs
    /// ```text
    /// Cart currency: USD
    ///      │
    ///      ▼
    /// add_item("p2", 500, "EUR", 1)
    ///      │
    ///      ▼
    /// MixedCurrency { expected: "USD", found: "EUR" }
    /// ```
    #[error("Cart currency is {expected}, cannot add item priced in {found}")]
    MixedCurrency { expected: String, found: String },

    /// Persisted cart payload could not be decoded.
    #[error("Invalid cart payload: {0}")]
    InvalidPayload(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidPayload(err.to_string())
    }
}

// =============================================================================
// Pricing Error
// =============================================================================

/// Errors raised by [`crate::pricing::compute_summary`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    /// Line items disagree on currency. The aggregator never converts.
    #[error("Mixed currencies in one summary: {first} and {second}")]
    MixedCurrency { first: String, second: String },

    /// A discount definition is out of range.
    #[error("Invalid discount {id}: {reason}")]
    InvalidDiscount { id: String, reason: String },

    /// A line subtotal or cart total does not fit in i64 cents.
    #[error("Cart amounts overflow the supported range")]
    Overflow,

    /// Validation error (tax rate, line item fields).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., lowercase currency code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::MixedCurrency {
            expected: "USD".to_string(),
            found: "EUR".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cart currency is USD, cannot add item priced in EUR"
        );

        let err = PricingError::InvalidDiscount {
            id: "SPRING".to_string(),
            reason: "percentage above 100%".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid discount SPRING: percentage above 100%");
    }

    #[test]
    fn test_validation_converts() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.clone().into();
        assert!(matches!(core_err, CoreError::Validation(_)));

        let pricing_err: PricingError = validation_err.into();
        assert_eq!(pricing_err.to_string(), "Validation error: quantity must be positive");
    }

    #[test]
    fn test_json_error_becomes_invalid_payload() {
        let err = serde_json::from_str::<Vec<u32>>("{not json").unwrap_err();
        let core_err: CoreError = err.into();
        assert!(matches!(core_err, CoreError::InvalidPayload(_)));
    }
}
