//! # Domain Types
//!
//! Core domain types shared by the cart, the pricing aggregator and the UI.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  CartLineItem   │   │    Discount     │   │    TaxRate      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  product_id     │   │  id             │   │  bps (u32)      │       │
//! │  │  quantity       │   │  value          │   │  600 = 6%       │       │
//! │  │  unit_price     │   │  scope          │   └─────────────────┘       │
//! │  │  currency       │   └─────────────────┘                             │
//! │  └─────────────────┘                                                    │
//! │           │                     │                    │                  │
//! │           └─────────────────────┼────────────────────┘                  │
//! │                                 ▼                                       │
//! │                       ┌─────────────────┐                               │
//! │                       │   CartSummary   │  (derived, never stored)     │
//! │                       └─────────────────┘                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so a 6% rate is `TaxRate::from_bps(600)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Tax owed on `base`, rounded half-up to the minor unit.
    #[inline]
    pub fn tax_on(&self, base: Money) -> Money {
        base.percentage(self.0)
    }
}

// =============================================================================
// Cart Line Item
// =============================================================================

/// One product in the cart.
///
/// There is at most one line per `product_id`; adding the same product
/// again grows `quantity` instead (see [`crate::cart::Cart::add_item`]).
///
/// This is also the persisted record shape under the `cart_items` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Product identifier, unique within the cart.
    pub product_id: String,

    /// Always >= 1 once the item is inside a cart.
    pub quantity: i64,

    /// Price per unit, frozen when the item was added.
    pub unit_price: Money,

    /// ISO-4217-like code ("USD"), uniform across a cart.
    pub currency: String,

    /// When the line was first added. Older payloads omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub added_at: Option<DateTime<Utc>>,
}

impl CartLineItem {
    /// Creates a line item stamped with the current time.
    pub fn new(
        product_id: impl Into<String>,
        quantity: i64,
        unit_price: Money,
        currency: impl Into<String>,
    ) -> Self {
        CartLineItem {
            product_id: product_id.into(),
            quantity,
            unit_price,
            currency: currency.into(),
            added_at: Some(Utc::now()),
        }
    }

    /// unit_price × quantity.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// unit_price × quantity, `None` if it doesn't fit in i64 cents.
    #[inline]
    pub fn checked_line_subtotal(&self) -> Option<Money> {
        self.unit_price.checked_multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Discounts
// =============================================================================

/// How much a discount takes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DiscountValue {
    /// Basis points of the base (1000 = 10%). Valid range 0..=10000.
    Percentage(u32),
    /// A flat amount, capped at the base it applies to.
    Fixed(Money),
}

/// What a discount is computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountScope {
    /// The cart subtotal after item-scoped discounts.
    Cart,
    /// A line's own subtotal. `product_id: None` targets every line.
    Item {
        #[serde(default, rename = "productId")]
        product_id: Option<String>,
    },
}

impl DiscountScope {
    /// Returns true if this scope covers the given line.
    pub fn covers(&self, item: &CartLineItem) -> bool {
        match self {
            DiscountScope::Cart => false,
            DiscountScope::Item { product_id: None } => true,
            DiscountScope::Item {
                product_id: Some(id),
            } => *id == item.product_id,
        }
    }
}

/// A discount offered on the cart or its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub value: DiscountValue,
    pub scope: DiscountScope,
}

impl Discount {
    /// Percentage discount on the whole cart.
    pub fn cart_percentage(id: impl Into<String>, bps: u32) -> Self {
        Discount {
            id: id.into(),
            value: DiscountValue::Percentage(bps),
            scope: DiscountScope::Cart,
        }
    }

    /// Fixed discount on the whole cart.
    pub fn cart_fixed(id: impl Into<String>, amount: Money) -> Self {
        Discount {
            id: id.into(),
            value: DiscountValue::Fixed(amount),
            scope: DiscountScope::Cart,
        }
    }

    /// Discount applied to one product's line.
    pub fn for_product(
        id: impl Into<String>,
        product_id: impl Into<String>,
        value: DiscountValue,
    ) -> Self {
        Discount {
            id: id.into(),
            value,
            scope: DiscountScope::Item {
                product_id: Some(product_id.into()),
            },
        }
    }

    /// Discount applied to every line individually.
    pub fn per_item(id: impl Into<String>, value: DiscountValue) -> Self {
        Discount {
            id: id.into(),
            value,
            scope: DiscountScope::Item { product_id: None },
        }
    }

    pub fn is_cart_scoped(&self) -> bool {
        matches!(self.scope, DiscountScope::Cart)
    }

    /// The amount this discount takes off `base`, never more than `base`.
    pub fn amount_against(&self, base: Money) -> Money {
        let base = base.non_negative();
        match self.value {
            DiscountValue::Percentage(bps) => base.percentage(bps).min(base),
            DiscountValue::Fixed(amount) => amount.non_negative().min(base),
        }
    }
}

// =============================================================================
// Cart Summary
// =============================================================================

/// Per-line breakdown inside a [`CartSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineSummary {
    pub product_id: String,
    pub quantity: i64,
    pub subtotal: Money,
    /// Sum of item-scoped discounts taken on this line.
    pub discount: Money,
    /// subtotal − discount.
    pub net: Money,
}

/// A discount and the amount it actually contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscount {
    pub discount_id: String,
    /// Set for item-scoped contributions.
    pub product_id: Option<String>,
    pub amount: Money,
}

/// Derived totals for a cart. Never stored; recompute on every change.
///
/// ```text
/// subtotal       = Σ unit_price × quantity
/// discount_total = item discounts + cart discounts   (≤ subtotal)
/// taxable_base   = subtotal − discount_total         (≥ 0)
/// tax            = taxable_base × tax_rate           (half-up)
/// total          = taxable_base + tax
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    /// `None` for an empty cart.
    pub currency: Option<String>,
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
    pub discount_total: Money,
    pub taxable_base: Money,
    pub tax: Money,
    pub total: Money,
    pub lines: Vec<LineSummary>,
    pub applied: Vec<AppliedDiscount>,
}

impl CartSummary {
    /// The all-zero summary of an empty cart.
    pub fn empty() -> Self {
        CartSummary::default()
    }
}
