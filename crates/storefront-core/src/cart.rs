//! # Cart
//!
//! The line-item boundary: every quantity, price and currency is checked
//! here so the pricing aggregator can trust its input.
//!
//! ## Cart Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UI Action            Cart Method             Effect                    │
//! │  ─────────            ───────────             ──────                    │
//! │  Add to cart ───────► add_item() ───────────► push, or grow quantity    │
//! │  Change quantity ───► update_quantity() ────► set qty (0 removes)       │
//! │  Remove ────────────► remove_item() ────────► drop line                 │
//! │  Clear ─────────────► clear() ──────────────► empty                     │
//! │  Checkout ──────────► summary() ────────────► CartSummary               │
//! │  Persist/restore ───► to_json()/from_json() ► "cart_items" payload      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - One line per `product_id`
//! - 1 <= quantity <= MAX_ITEM_QUANTITY
//! - At most MAX_CART_ITEMS distinct lines
//! - Every line has the same currency

use serde::Serialize;

use crate::error::{CoreError, CoreResult, PricingError};
use crate::money::Money;
use crate::pricing::compute_summary;
use crate::types::{CartLineItem, CartSummary, Discount, TaxRate};
use crate::validation::{
    validate_cart_size, validate_currency, validate_product_id, validate_quantity,
    validate_unit_price,
};
use crate::MAX_ITEM_QUANTITY;

/// Key the external key-value store keeps the serialized cart under.
pub const CART_STORAGE_KEY: &str = "cart_items";

/// An ordered collection of validated line items.
///
/// Serializes as a bare JSON array of [`CartLineItem`] so the persisted
/// payload matches what the mini-app stores under [`CART_STORAGE_KEY`].
/// There is no `Deserialize`: restoring goes through [`Cart::from_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a product, or increases its quantity if it's already present.
    ///
    /// ## Errors
    /// - Validation errors for id, price, currency or quantity
    /// - [`CoreError::MixedCurrency`] if the cart holds another currency
    /// - [`CoreError::QuantityTooLarge`] if the merged quantity exceeds 999
    /// - [`CoreError::CartTooLarge`] for a 101st distinct product
    pub fn add_item(
        &mut self,
        product_id: &str,
        unit_price: Money,
        currency: &str,
        quantity: i64,
    ) -> CoreResult<()> {
        validate_product_id(product_id)?;
        validate_unit_price(unit_price)?;
        validate_currency(currency)?;
        validate_quantity(quantity)?;
        self.check_currency(currency)?;

        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            item.quantity = new_qty;
            return Ok(());
        }

        validate_cart_size(self.items.len()).map_err(|_| CoreError::CartTooLarge {
            max: crate::MAX_CART_ITEMS,
        })?;

        self.items
            .push(CartLineItem::new(product_id, quantity, unit_price, currency));
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(product_id);
        }
        validate_quantity(quantity)?;

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::NotInCart(product_id.to_string())),
        }
    }

    /// Removes a line by product ID.
    pub fn remove_item(&mut self, product_id: &str) -> CoreResult<()> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.product_id != product_id);

        if self.items.len() == initial_len {
            Err(CoreError::NotInCart(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of all quantities.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// The cart currency, once the first item is in.
    pub fn currency(&self) -> Option<&str> {
        self.items.first().map(|i| i.currency.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Prices the cart.
    pub fn summary(
        &self,
        discounts: &[Discount],
        tax_rate: TaxRate,
    ) -> Result<CartSummary, PricingError> {
        compute_summary(&self.items, discounts, tax_rate)
    }

    // =========================================================================
    // Persistence Format
    // =========================================================================

    /// Serializes the cart as the `cart_items` JSON array.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(&self.items)?)
    }

    /// Rebuilds a cart from a `cart_items` payload.
    ///
    /// Each record goes back through [`Cart::add_item`], so stored
    /// duplicates merge and invalid records are rejected rather than
    /// smuggled past the boundary. Original timestamps are kept.
    pub fn from_json(payload: &str) -> CoreResult<Self> {
        let records: Vec<CartLineItem> = serde_json::from_str(payload)?;
        let mut cart = Cart::new();

        for record in records {
            let existed = cart.items.iter().any(|i| i.product_id == record.product_id);
            cart.add_item(
                &record.product_id,
                record.unit_price,
                &record.currency,
                record.quantity,
            )?;
            if !existed && record.added_at.is_some() {
                if let Some(line) = cart.items.last_mut() {
                    line.added_at = record.added_at;
                }
            }
        }

        Ok(cart)
    }

    fn check_currency(&self, currency: &str) -> CoreResult<()> {
        match self.currency() {
            Some(expected) if expected != currency => Err(CoreError::MixedCurrency {
                expected: expected.to_string(),
                found: currency.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
