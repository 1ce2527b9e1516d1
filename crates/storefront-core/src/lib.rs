//! # storefront-core: Pure Cart & Pricing Logic
//!
//! This crate holds the storefront's business rules as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Mini-app UI (external)                          │   │
//! │  │     Catalog ──► Cart ──► Checkout ──► Payment initiation        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          storefront-state (async operation state)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ storefront-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌──────────────────┐  │   │
//! │  │   │  types  │  │  money  │  │  cart   │  │ pricing          │  │   │
//! │  │   │Discount │  │  Money  │  │  Cart   │  │ compute_summary  │  │   │
//! │  │   │ Summary │  │ (cents) │  │ (JSON)  │  │ (pure)           │  │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO TIMERS • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Line items, discounts, tax rate, summaries
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Validated cart and its persisted JSON format
//! - [`pricing`] - Discount / tax / total aggregation
//! - [`validation`] - Boundary checks
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::{Cart, Discount, Money, TaxRate};
//!
//! let mut cart = Cart::new();
//! cart.add_item("p1", Money::from_cents(10000), "USD", 2).unwrap();
//!
//! let summary = cart
//!     .summary(&[Discount::cart_percentage("TEN", 1000)], TaxRate::from_bps(600))
//!     .unwrap();
//! assert_eq!(summary.total.cents(), 19080); // 190.80
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CART_STORAGE_KEY};
pub use error::{CoreError, CoreResult, PricingError, ValidationError};
pub use money::Money;
pub use pricing::{compute_summary, CartPricingAggregator};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct products in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single product in the cart.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum unit price in minor units (100,000,000.00).
///
/// A full cart at this price and quantity stays well inside i64 cents.
pub const MAX_UNIT_PRICE_CENTS: i64 = 10_000_000_000;
