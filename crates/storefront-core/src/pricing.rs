//! # Cart Pricing
//!
//! Turns line items, discounts and a tax rate into a [`CartSummary`].
//!
//! ## Application Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Per line: subtotal = unit_price × quantity                          │
//! │        └─► item-scoped discounts, each against the LINE subtotal,       │
//! │            summed (additive), capped at the line subtotal               │
//! │                                                                         │
//! │  2. Cart base = Σ line subtotals − Σ item discounts                     │
//! │        └─► cart-scoped discounts, each against the SAME cart base,      │
//! │            summed (additive), capped at the cart base                   │
//! │                                                                         │
//! │  3. taxable_base = subtotal − discount_total     (never negative)       │
//! │     tax          = taxable_base × rate           (round half-up)        │
//! │     total        = taxable_base + tax                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Additive stacking means two 10% cart discounts take 20% of the base,
//! not 19%.
//!
//! ## Example
//! ```rust
//! use storefront_core::money::Money;
//! use storefront_core::pricing::compute_summary;
//! use storefront_core::types::{CartLineItem, Discount, TaxRate};
//!
//! let items = vec![CartLineItem::new("p1", 2, Money::from_cents(10000), "USD")];
//! let discounts = vec![Discount::cart_percentage("TEN", 1000)];
//!
//! let summary = compute_summary(&items, &discounts, TaxRate::from_bps(600)).unwrap();
//! assert_eq!(summary.subtotal.cents(), 20000);
//! assert_eq!(summary.discount_total.cents(), 2000);
//! assert_eq!(summary.taxable_base.cents(), 18000);
//! assert_eq!(summary.tax.cents(), 1080);
//! assert_eq!(summary.total.cents(), 19080);
//! ```

use crate::error::PricingError;
use crate::money::Money;
use crate::types::{AppliedDiscount, CartLineItem, CartSummary, Discount, LineSummary, TaxRate};
use crate::validation::{validate_discount, validate_tax_rate};

/// Aggregator bound to one tax rate.
///
/// Holds configuration only; every call to [`CartPricingAggregator::compute`]
/// starts from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CartPricingAggregator {
    tax_rate: TaxRate,
}

impl CartPricingAggregator {
    pub fn new(tax_rate: TaxRate) -> Self {
        CartPricingAggregator { tax_rate }
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn compute(
        &self,
        items: &[CartLineItem],
        discounts: &[Discount],
    ) -> Result<CartSummary, PricingError> {
        compute_summary(items, discounts, self.tax_rate)
    }
}

/// Computes the summary for a cart.
///
/// Deterministic: the same inputs always give the same summary.
///
/// ## Preconditions
/// - Every item has `quantity >= 1` (enforced by [`crate::cart::Cart`])
/// - All items share one currency, otherwise [`PricingError::MixedCurrency`]
/// - Discounts and the tax rate are in range
/// - Amounts fit in i64 cents, otherwise [`PricingError::Overflow`]. Items
///   that came through [`crate::cart::Cart`] always do.
///
/// An empty item list short-circuits to [`CartSummary::empty`] whatever the
/// discounts and rate are.
pub fn compute_summary(
    items: &[CartLineItem],
    discounts: &[Discount],
    tax_rate: TaxRate,
) -> Result<CartSummary, PricingError> {
    if items.is_empty() {
        return Ok(CartSummary::empty());
    }

    validate_tax_rate(tax_rate)?;
    for discount in discounts {
        validate_discount(discount).map_err(|reason| PricingError::InvalidDiscount {
            id: discount.id.clone(),
            reason,
        })?;
    }
    let currency = uniform_currency(items)?;

    let mut applied = Vec::new();

    // Item scope first, each line against its own subtotal.
    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Money::zero();
    let mut item_discounts = Money::zero();

    for item in items {
        let line_subtotal = item
            .checked_line_subtotal()
            .ok_or(PricingError::Overflow)?;
        let mut discount = Money::zero();

        for d in discounts.iter().filter(|d| d.scope.covers(item)) {
            let amount = d
                .amount_against(line_subtotal)
                .min(line_subtotal.saturating_sub(discount));
            if amount.is_zero() {
                continue;
            }
            discount += amount;
            applied.push(AppliedDiscount {
                discount_id: d.id.clone(),
                product_id: Some(item.product_id.clone()),
                amount,
            });
        }

        subtotal = subtotal
            .checked_add(line_subtotal)
            .ok_or(PricingError::Overflow)?;
        // Bounded by subtotal, which just fit.
        item_discounts += discount;

        lines.push(LineSummary {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            subtotal: line_subtotal,
            discount,
            net: line_subtotal - discount,
        });
    }

    // Cart scope against the already-reduced subtotal.
    let cart_base = subtotal.saturating_sub(item_discounts);
    let mut cart_discounts = Money::zero();
    for d in discounts.iter().filter(|d| d.is_cart_scoped()) {
        let amount = d
            .amount_against(cart_base)
            .min(cart_base.saturating_sub(cart_discounts));
        if amount.is_zero() {
            continue;
        }
        cart_discounts += amount;
        applied.push(AppliedDiscount {
            discount_id: d.id.clone(),
            product_id: None,
            amount,
        });
    }

    let discount_total = (item_discounts + cart_discounts).min(subtotal);
    let taxable_base = subtotal.saturating_sub(discount_total);
    let tax = tax_rate.tax_on(taxable_base);
    let total = taxable_base
        .checked_add(tax)
        .ok_or(PricingError::Overflow)?;
    let total_quantity = items
        .iter()
        .try_fold(0i64, |acc, i| acc.checked_add(i.quantity))
        .ok_or(PricingError::Overflow)?;

    Ok(CartSummary {
        currency: Some(currency.to_string()),
        item_count: items.len(),
        total_quantity,
        subtotal,
        discount_total,
        taxable_base,
        tax,
        total,
        lines,
        applied,
    })
}

fn uniform_currency(items: &[CartLineItem]) -> Result<&str, PricingError> {
    let first = items[0].currency.as_str();
    match items.iter().find(|i| i.currency != first) {
        Some(other) => Err(PricingError::MixedCurrency {
            first: first.to_string(),
            second: other.currency.clone(),
        }),
        None => Ok(first),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
