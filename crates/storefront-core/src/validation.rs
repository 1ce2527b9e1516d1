//! # Validation Module
//!
//! Line-item and pricing input checks.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI form ──► Cart::add_item ──► validate_* (THIS MODULE) ──► Cart       │
//! │                                                                         │
//! │  Cart ──► compute_summary ──► validate_tax_rate / validate_discount     │
//! │                                                                         │
//! │  The aggregator assumes quantities are already >= 1: zero quantities    │
//! │  are rejected here, at the line-item boundary.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::{Money, BPS_SCALE};
use crate::types::{Discount, DiscountValue, TaxRate};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product identifier.
///
/// ## Rules
/// - Must not be empty or whitespace
/// - No leading or trailing whitespace
/// - At most 64 characters
///
/// ```rust
/// use storefront_core::validation::validate_product_id;
///
/// assert!(validate_product_id("sticker-pack-01").is_ok());
/// assert!(validate_product_id("  ").is_err());
/// assert!(validate_product_id("p1 ").is_err());
/// ```
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    let trimmed = id.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "productId".to_string(),
        });
    }

    if trimmed.len() != id.len() {
        return Err(ValidationError::InvalidFormat {
            field: "productId".to_string(),
            reason: "must not start or end with whitespace".to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "productId".to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates an ISO-4217-like currency code: exactly three uppercase ASCII
/// letters ("USD", "TON", "XTR").
pub fn validate_currency(code: &str) -> ValidationResult<()> {
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "currency".to_string(),
        });
    }

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be three uppercase letters".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price: 0 (free goods) up to `MAX_UNIT_PRICE_CENTS`.
pub fn validate_unit_price(price: Money) -> ValidationResult<()> {
    if price.is_negative() || price.cents() > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "unitPrice".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a tax rate: 0% to 100%.
pub fn validate_tax_rate(rate: TaxRate) -> ValidationResult<()> {
    if rate.bps() as i64 > BPS_SCALE {
        return Err(ValidationError::OutOfRange {
            field: "taxRate".to_string(),
            min: 0,
            max: BPS_SCALE,
        });
    }

    Ok(())
}

/// Validates a discount definition.
///
/// Returns the human-readable reason on failure so callers can wrap it
/// with the discount id.
pub fn validate_discount(discount: &Discount) -> Result<(), String> {
    match discount.value {
        DiscountValue::Percentage(bps) if bps as i64 > BPS_SCALE => {
            Err(format!("percentage {} bps exceeds 100%", bps))
        }
        DiscountValue::Fixed(amount) if amount.is_negative() => {
            Err(format!("fixed amount {} is negative", amount))
        }
        _ => Ok(()),
    }
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more distinct line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id("p1").is_ok());
        assert!(validate_product_id("").is_err());
        assert!(validate_product_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_product_id_surrounding_whitespace_rejected() {
        assert!(matches!(
            validate_product_id("p1 "),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(validate_product_id(" p1").is_err());
        assert!(validate_product_id("gift card").is_ok());
    }

    #[test]
    fn test_validate_currency() {
        assert!(validate_currency("USD").is_ok());
        assert!(validate_currency("XTR").is_ok());
        assert!(validate_currency("").is_err());
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("US").is_err());
        assert!(validate_currency("USDT").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_unit_price() {
        assert!(validate_unit_price(Money::zero()).is_ok());
        assert!(validate_unit_price(Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_unit_price_upper_bound() {
        assert!(validate_unit_price(Money::from_cents(MAX_UNIT_PRICE_CENTS)).is_ok());
        assert!(matches!(
            validate_unit_price(Money::from_cents(MAX_UNIT_PRICE_CENTS + 1)),
            Err(ValidationError::OutOfRange { max: MAX_UNIT_PRICE_CENTS, .. })
        ));
    }

    #[test]
    fn test_validate_tax_rate() {
        assert!(validate_tax_rate(TaxRate::from_bps(0)).is_ok());
        assert!(validate_tax_rate(TaxRate::from_bps(10_000)).is_ok());
        assert!(validate_tax_rate(TaxRate::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(&Discount::cart_percentage("A", 10_000)).is_ok());
        assert!(validate_discount(&Discount::cart_percentage("B", 10_001)).is_err());
        assert!(validate_discount(&Discount::cart_fixed("C", Money::from_cents(-5))).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS - 1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }
}
